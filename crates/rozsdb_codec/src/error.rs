//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while compressing, decompressing or parsing documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input was not valid JSON.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Parser error description.
        message: String,
    },

    /// Input was valid JSON but not an object.
    #[error("document must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// Compression failed.
    #[error("compression failed: {message}")]
    Compression {
        /// Description of the failure.
        message: String,
    },

    /// The frame could not be decompressed.
    #[error("decompression failed: {message}")]
    Decompression {
        /// Description of the failure.
        message: String,
    },

    /// Decompressed payload was not UTF-8.
    #[error("invalid UTF-8 in document")]
    InvalidUtf8,
}

impl CodecError {
    /// Create an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Create a compression error.
    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a decompression error.
    pub fn decompression(message: impl Into<String>) -> Self {
        Self::Decompression {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_json(err.to_string())
    }
}
