use thiserror::Error;

use crate::bencode::BencodeError;

/// Everything that can go wrong announcing to a tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("unsupported announce URI scheme: {0:?}")]
    UnsupportedScheme(String),

    #[error("could not parse announce URL: {0}")]
    UrlParse(String),

    #[error("tracker returned HTTP status {status}")]
    Http { status: u16 },

    #[error("tracker reported failure: {0}")]
    Failure(String),

    #[error("malformed tracker response: {0}")]
    Bencode(#[from] BencodeError),

    #[error("malformed tracker response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("receiving timed out")]
    Timeout,

    #[error("UDP protocol mismatch: {0}")]
    ProtocolMismatch(String),
}
