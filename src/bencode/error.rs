use thiserror::Error;

/// Everything that can go wrong decoding or encoding a bencoded value.
#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("expected {expected:?} at byte {position}, found {found:?}")]
    UnexpectedByte {
        position: usize,
        expected: &'static str,
        found: u8,
    },

    #[error("invalid integer literal at byte {position}: {reason}")]
    InvalidInteger { position: usize, reason: &'static str },

    #[error("invalid string length at byte {position}")]
    InvalidStringLength { position: usize },

    #[error("dictionary keys out of order at byte {position}: {previous:?} before {key:?} is not ascending")]
    UnorderedKey {
        position: usize,
        previous: Vec<u8>,
        key: Vec<u8>,
    },

    #[error("trailing data after top-level value, starting at byte {position}")]
    TrailingData { position: usize },
}
