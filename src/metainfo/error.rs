use std::path::PathBuf;

use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors raised while reading, mutating or writing a [`super::Metainfo`].
#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed bencode: {0}")]
    Bencode(#[from] BencodeError),

    #[error("metainfo has no `info` dictionary")]
    MissingInfo,

    #[error("`info` is missing required key {key:?}")]
    MissingField { key: &'static str },

    #[error("`info` key {key:?} has the wrong type")]
    InvalidFieldType { key: &'static str },

    #[error("piece length must be greater than zero")]
    InvalidPieceLength,

    #[error("pieces byte-string length {len} is not a multiple of 20")]
    InvalidPiecesLength { len: usize },

    #[error("cannot add {0}: it does not exist on disk")]
    FileNotFound(PathBuf),
}
