use std::collections::BTreeMap;
use std::fmt;

/// A decoded bencode value.
///
/// Dictionary keys are raw bytes, not `String` — bencode never requires keys
/// to be valid UTF-8, and a few real torrents (and all of this crate's test
/// vectors for `pieces`) carry binary byte-strings. `BTreeMap<Vec<u8>, _>`
/// orders keys by byte value, which is exactly bencode's canonical ordering,
/// so encoding a `Dict` back out never needs a separate sort step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BValue {
    Integer(i64),
    Bytes(Vec<u8>),
    List(Vec<BValue>),
    Dict(BTreeMap<Vec<u8>, BValue>),
}

impl BValue {
    pub fn integer(value: i64) -> Self {
        BValue::Integer(value)
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        BValue::Bytes(value.into())
    }

    pub fn list(values: Vec<BValue>) -> Self {
        BValue::List(values)
    }

    pub fn dict() -> Self {
        BValue::Dict(BTreeMap::new())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BValue]> {
        match self {
            BValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BValue>> {
        match self {
            BValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut BTreeMap<Vec<u8>, BValue>> {
        match self {
            BValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up `key` (as ASCII) in a `Dict`, returning `None` for any other
    /// variant or a missing key.
    pub fn get(&self, key: &str) -> Option<&BValue> {
        self.as_dict()?.get(key.as_bytes())
    }

    /// Inserts `key` (as ASCII) into a `Dict` in place. Panics if `self` is
    /// not a `Dict` — callers build dicts explicitly via [`BValue::dict`].
    pub fn insert(&mut self, key: &str, value: BValue) {
        self.as_dict_mut()
            .expect("insert called on a non-dict BValue")
            .insert(key.as_bytes().to_vec(), value);
    }
}

impl fmt::Display for BValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BValue::Integer(i) => write!(f, "{i}"),
            BValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) if s.chars().all(|c| !c.is_control()) => write!(f, "{s:?}"),
                _ => write!(f, "<{} bytes>", b.len()),
            },
            BValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            BValue::Dict(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match std::str::from_utf8(key) {
                        Ok(s) => write!(f, "{s:?}: {value}")?,
                        Err(_) => write!(f, "<{} bytes>: {value}", key.len())?,
                    }
                }
                write!(f, "}}")
            }
        }
    }
}
