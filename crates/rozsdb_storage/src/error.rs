//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be used as a blob name.
    #[error("invalid blob key: {0:?}")]
    InvalidKey(String),

    /// The path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

/// Checks that `key` is a plain file name.
///
/// Keys become file names inside a single directory, so separators and
/// relative components are rejected.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(&['/', '\\', '\0'][..]);
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_valid() {
        assert!(validate_key("AbC123xyz000").is_ok());
        assert!(validate_key("meta.rozs").is_ok());
    }

    #[test]
    fn traversal_is_rejected() {
        for key in ["", ".", "..", "../x", "a/b", "a\\b"] {
            assert!(matches!(validate_key(key), Err(StorageError::InvalidKey(_))));
        }
    }
}
