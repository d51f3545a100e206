use thiserror::Error;

/// Everything that can go wrong opening or running a peer session.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer session is already open")]
    AlreadyOpen,

    #[error("peer session is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake info-hash mismatch: expected {expected}, got {got}")]
    InfoHashMismatch { expected: String, got: String },

    #[error("malformed handshake: {0}")]
    InvalidHandshake(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
