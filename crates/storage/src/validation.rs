//! Size limits for keys and values.

use crate::error::{Result, StorageError};

/// Maximum key length in characters.
pub const MAX_KEY_LEN: usize = 20;

/// Maximum value size in bytes (120 KiB).
pub const MAX_VALUE_LEN: usize = 120 * 1024;

pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    let len = key.chars().count();
    if len > MAX_KEY_LEN {
        return Err(StorageError::KeyTooLong {
            len,
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

pub fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_VALUE_LEN {
        return Err(StorageError::ValueTooLarge {
            len: value.len(),
            max: MAX_VALUE_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_limits() {
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(matches!(
            validate_key(&"k".repeat(MAX_KEY_LEN + 1)),
            Err(StorageError::KeyTooLong { len: 21, max: 20 })
        ));
        assert!(matches!(validate_key(""), Err(StorageError::EmptyKey)));
    }

    #[test]
    fn test_key_limit_counts_characters() {
        // 20 two-byte characters: 40 bytes, still within the limit.
        assert!(validate_key(&"é".repeat(MAX_KEY_LEN)).is_ok());
        assert!(matches!(
            validate_key(&"é".repeat(MAX_KEY_LEN + 1)),
            Err(StorageError::KeyTooLong { len: 21, .. })
        ));
    }

    #[test]
    fn test_value_limits() {
        assert!(validate_value("").is_ok());
        assert!(validate_value(&"v".repeat(MAX_VALUE_LEN)).is_ok());
        let err = validate_value(&"v".repeat(MAX_VALUE_LEN + 1)).unwrap_err();
        assert!(err.is_validation());
    }
}
