//! Error types for a running node.

use crate::coordination::CoordinationError;

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("ring error: {0}")]
    Ring(#[from] corelib::Error),

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("streaming error: {0}")]
    Streaming(#[from] streaming::StreamingError),

    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed node metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
