//! Error types for the storage layer.

/// Result type alias for the storage layer.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("key must not be empty")]
    EmptyKey,

    #[error("key length {len} exceeds maximum of {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("value size {len} exceeds maximum of {max} bytes")]
    ValueTooLarge { len: usize, max: usize },

    #[error("storage I/O error: {0}")]
    Io(#[from] sled::Error),

    #[error("stored data for key {0:?} is not valid UTF-8")]
    Corrupted(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// True for errors raised before touching cache or store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StorageError::EmptyKey | StorageError::KeyTooLong { .. } | StorageError::ValueTooLarge { .. }
        )
    }
}
