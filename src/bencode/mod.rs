//! Bencode codec: the wire format every other module builds on.
//!
//! Bencode has no dependency on the rest of this crate — it is a pure
//! recursive data format (integers, byte-strings, lists and dictionaries
//! with keys in ascending byte order) and nothing about it is BitTorrent
//! specific beyond the name. `metainfo::Metainfo`'s info-hash is the SHA-1
//! of this codec's canonical encoding of the `info` sub-dictionary, so
//! canonical round-tripping (`encode(decode(encode(v))) == encode(v)`) is
//! the property the rest of the crate's identity guarantees rest on.

mod bvalue;
mod decoder;
mod encoder;
mod error;

pub use bvalue::BValue;
pub use error::BencodeError;

use decoder::Decoder;

/// Decodes exactly one bencoded value from `input`, erroring on trailing
/// bytes or malformed syntax.
pub fn decode(input: &[u8]) -> Result<BValue, BencodeError> {
    Decoder::new(input).decode()
}

/// Encodes `value` to its canonical bencoded form.
pub fn encode(value: &BValue) -> Vec<u8> {
    encoder::encode(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_round_trips() {
        let value = decode(b"d3:bar4:spam3:fooi42ee").unwrap();
        assert_eq!(encode(&value), b"d3:bar4:spam3:fooi42ee");
    }
}
