//! Error types for the streaming layer.

use std::time::Duration;

/// Result type alias for the streaming layer.
pub type Result<T> = std::result::Result<T, StreamingError>;

#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("peer acknowledged {acknowledged} of {sent} entries")]
    TransferMismatch { sent: u64, acknowledged: u64 },

    #[error("unable to store migrated entry: {0}")]
    Sink(String),

    #[error("no migration sender connected within {0:?}")]
    AcceptTimeout(Duration),
}
