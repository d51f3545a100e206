//! Canonical bencode encoder.
//!
//! Encoding is the direction an info-hash actually depends on: two `BValue`s
//! that are `==` must always produce identical bytes, and dict keys always
//! come out in ascending byte order since they're stored in a `BTreeMap`.

use crate::bencode::BValue;

pub fn encode(value: &BValue) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &BValue, out: &mut Vec<u8>) {
    match value {
        BValue::Integer(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        BValue::Bytes(bytes) => {
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(bytes);
        }
        BValue::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        BValue::Dict(map) => {
            out.push(b'd');
            for (key, value) in map {
                encode_into(&BValue::Bytes(key.clone()), out);
                encode_into(value, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn encodes_integers() {
        assert_eq!(encode(&BValue::Integer(42)), b"i42e");
        assert_eq!(encode(&BValue::Integer(-42)), b"i-42e");
        assert_eq!(encode(&BValue::Integer(0)), b"i0e");
    }

    #[test]
    fn encodes_byte_strings() {
        assert_eq!(encode(&BValue::Bytes(b"spam".to_vec())), b"4:spam");
        assert_eq!(encode(&BValue::Bytes(Vec::new())), b"0:");
    }

    #[test]
    fn encodes_lists() {
        let list = BValue::List(vec![
            BValue::Bytes(b"spam".to_vec()),
            BValue::Bytes(b"eggs".to_vec()),
        ]);
        assert_eq!(encode(&list), b"l4:spam4:eggse");
    }

    #[test]
    fn encodes_dicts_in_sorted_key_order() {
        let mut map = BTreeMap::new();
        map.insert(b"spam".to_vec(), BValue::Bytes(b"eggs".to_vec()));
        map.insert(b"cow".to_vec(), BValue::Bytes(b"moo".to_vec()));
        let dict = BValue::Dict(map);
        assert_eq!(encode(&dict), b"d3:cow3:moo4:spam4:eggse");
    }

    #[test]
    fn encode_decode_round_trips() {
        use crate::bencode::decoder::Decoder;
        let mut inner = BTreeMap::new();
        inner.insert(b"a".to_vec(), BValue::Integer(1));
        inner.insert(b"b".to_vec(), BValue::List(vec![BValue::Bytes(b"x".to_vec())]));
        let original = BValue::Dict(inner);
        let encoded = encode(&original);
        let decoded = Decoder::new(&encoded).decode().unwrap();
        assert_eq!(decoded, original);
        assert_eq!(encode(&decoded), encoded);
    }
}
