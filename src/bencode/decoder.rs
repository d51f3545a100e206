//! Recursive-descent bencode decoder operating over raw bytes.
//!
//! Bencode is not a text format — byte-strings carry a length, not an
//! encoding — so the decoder is built on `&[u8]` and a byte cursor, never
//! `&str` or `char`. This matters in practice: the `pieces` field of a
//! torrent's `info` dict is a concatenation of raw SHA-1 digests, which is
//! essentially guaranteed to contain invalid UTF-8.

use std::collections::BTreeMap;

use crate::bencode::error::BencodeError;
use crate::bencode::BValue;

pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Decoder { input, position: 0 }
    }

    /// Decodes exactly one top-level value, erroring on trailing bytes.
    pub fn decode(mut self) -> Result<BValue, BencodeError> {
        let value = self.parse_value()?;
        if self.position != self.input.len() {
            return Err(BencodeError::TrailingData {
                position: self.position,
            });
        }
        Ok(value)
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.position)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    fn advance(&mut self) -> Result<u8, BencodeError> {
        let byte = self.peek()?;
        self.position += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8, label: &'static str) -> Result<(), BencodeError> {
        let found = self.advance()?;
        if found != expected {
            return Err(BencodeError::UnexpectedByte {
                position: self.position - 1,
                expected: label,
                found,
            });
        }
        Ok(())
    }

    fn parse_value(&mut self) -> Result<BValue, BencodeError> {
        match self.peek()? {
            b'i' => self.parse_integer(),
            b'l' => self.parse_list(),
            b'd' => self.parse_dict(),
            b'0'..=b'9' => self.parse_bytes().map(BValue::Bytes),
            found => Err(BencodeError::UnexpectedByte {
                position: self.position,
                expected: "'i', 'l', 'd' or a digit",
                found,
            }),
        }
    }

    /// `i<base-10 digits>e`. Leading zeros are rejected (`i03e` is invalid),
    /// as is a lone `-0` (`i-0e` is invalid) — both per the canonical grammar
    /// every bencode decoder agrees on, since without this rule two distinct
    /// byte strings could decode to the same integer, breaking canonical
    /// round-tripping.
    fn parse_integer(&mut self) -> Result<BValue, BencodeError> {
        self.expect(b'i', "'i'")?;
        let start = self.position;
        if self.peek()? == b'-' {
            self.advance()?;
        }
        let digits_start = self.position;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            self.advance()?;
        }
        if self.position == digits_start {
            return Err(BencodeError::InvalidInteger {
                position: start,
                reason: "no digits",
            });
        }
        let digits = &self.input[digits_start..self.position];
        if digits.len() > 1 && digits[0] == b'0' {
            return Err(BencodeError::InvalidInteger {
                position: start,
                reason: "leading zero",
            });
        }
        if digits == b"0" && self.input[start] == b'-' {
            return Err(BencodeError::InvalidInteger {
                position: start,
                reason: "negative zero",
            });
        }
        let text = std::str::from_utf8(&self.input[start..self.position])
            .map_err(|_| BencodeError::InvalidInteger {
                position: start,
                reason: "non-ASCII digits",
            })?;
        let value: i64 = text.parse().map_err(|_| BencodeError::InvalidInteger {
            position: start,
            reason: "out of range",
        })?;
        self.expect(b'e', "'e'")?;
        Ok(BValue::Integer(value))
    }

    /// `<base-10 length>:<raw bytes>`.
    fn parse_bytes(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.position;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            self.advance()?;
        }
        if self.position == start {
            return Err(BencodeError::InvalidStringLength { position: start });
        }
        let digits = &self.input[start..self.position];
        if digits.len() > 1 && digits[0] == b'0' {
            return Err(BencodeError::InvalidStringLength { position: start });
        }
        let text = std::str::from_utf8(digits)
            .map_err(|_| BencodeError::InvalidStringLength { position: start })?;
        let length: usize = text
            .parse()
            .map_err(|_| BencodeError::InvalidStringLength { position: start })?;
        self.expect(b':', "':'")?;
        let end = self
            .position
            .checked_add(length)
            .ok_or(BencodeError::InvalidStringLength { position: start })?;
        if end > self.input.len() {
            return Err(BencodeError::UnexpectedEof);
        }
        let bytes = self.input[self.position..end].to_vec();
        self.position = end;
        Ok(bytes)
    }

    fn parse_list(&mut self) -> Result<BValue, BencodeError> {
        self.expect(b'l', "'l'")?;
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.parse_value()?);
        }
        self.advance()?;
        Ok(BValue::List(items))
    }

    /// Dict keys must be byte-strings in strictly ascending order — the
    /// decoder enforces this rather than silently accepting it, since a
    /// dict that didn't round-trip to the same bytes on re-encode would
    /// silently change the info-hash of anything built from it.
    fn parse_dict(&mut self) -> Result<BValue, BencodeError> {
        self.expect(b'd', "'d'")?;
        let mut map = BTreeMap::new();
        let mut previous: Option<Vec<u8>> = None;
        while self.peek()? != b'e' {
            let key_position = self.position;
            let key = self.parse_bytes()?;
            if let Some(prev) = &previous {
                if key <= *prev {
                    return Err(BencodeError::UnorderedKey {
                        position: key_position,
                        previous: prev.clone(),
                        key,
                    });
                }
            }
            let value = self.parse_value()?;
            previous = Some(key.clone());
            map.insert(key, value);
        }
        self.advance()?;
        Ok(BValue::Dict(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<BValue, BencodeError> {
        Decoder::new(input).decode()
    }

    #[test]
    fn decodes_integers() {
        assert_eq!(decode(b"i42e").unwrap(), BValue::Integer(42));
        assert_eq!(decode(b"i-42e").unwrap(), BValue::Integer(-42));
        assert_eq!(decode(b"i0e").unwrap(), BValue::Integer(0));
    }

    #[test]
    fn rejects_malformed_integers() {
        assert!(decode(b"i042e").is_err());
        assert!(decode(b"i-0e").is_err());
        assert!(decode(b"ie").is_err());
        assert!(decode(b"i42").is_err());
    }

    #[test]
    fn decodes_byte_strings() {
        assert_eq!(decode(b"4:spam").unwrap(), BValue::Bytes(b"spam".to_vec()));
        assert_eq!(decode(b"0:").unwrap(), BValue::Bytes(Vec::new()));
    }

    #[test]
    fn decodes_binary_byte_strings_not_valid_utf8() {
        let raw = [0xff, 0x00, 0xfe, 0x10, 0x20];
        let mut input = b"5:".to_vec();
        input.extend_from_slice(&raw);
        assert_eq!(decode(&input).unwrap(), BValue::Bytes(raw.to_vec()));
    }

    #[test]
    fn decodes_lists() {
        assert_eq!(
            decode(b"l4:spam4:eggse").unwrap(),
            BValue::List(vec![
                BValue::Bytes(b"spam".to_vec()),
                BValue::Bytes(b"eggs".to_vec())
            ])
        );
        assert_eq!(decode(b"le").unwrap(), BValue::List(vec![]));
    }

    #[test]
    fn decodes_dicts_in_order() {
        let value = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.get(b"cow".as_slice()).unwrap().as_bytes(), Some(b"moo".as_slice()));
        assert_eq!(dict.get(b"spam".as_slice()).unwrap().as_bytes(), Some(b"eggs".as_slice()));
    }

    #[test]
    fn rejects_out_of_order_dict_keys() {
        assert!(decode(b"d4:spam3:foo3:bari42ee").is_err());
    }

    #[test]
    fn rejects_duplicate_dict_keys() {
        assert!(decode(b"d3:fooi1e3:fooi2ee").is_err());
    }

    #[test]
    fn rejects_non_string_dict_keys() {
        assert!(decode(b"di1ei2ee").is_err());
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(decode(b"i1ei2e").is_err());
        assert!(decode(b"4:spamgarbage").is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(decode(b"i42").is_err());
        assert!(decode(b"4spam").is_err());
        assert!(decode(b"l1:a").is_err());
        assert!(decode(b"d1:a").is_err());
    }
}
