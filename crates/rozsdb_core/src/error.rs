//! Error types for RozsDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in RozsDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] rozsdb_storage::StorageError),

    /// Compression or document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] rozsdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metadata (de)serialization error.
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client supplied a malformed or non-object document.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// The collection was evicted after being idle.
    #[error("collection timed out: {name}")]
    CollectionTimedOut {
        /// Name of the evicted collection.
        name: String,
    },

    /// Database not found.
    #[error("database not found: {name}")]
    DatabaseNotFound {
        /// Name of the database.
        name: String,
    },

    /// Collection not found.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// A database or collection name cannot be used on disk.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A document identifier was malformed.
    #[error("invalid object id: {value:?}")]
    InvalidObjectId {
        /// The rejected value.
        value: String,
    },

    /// The data directory is missing or is not a directory.
    #[error("invalid data directory: {message}")]
    InvalidRoot {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    DatabaseLocked,

    /// The engine has been shut down.
    #[error("engine is shut down")]
    EngineClosed,
}

impl CoreError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl ToString) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    /// Creates a collection timed out error.
    pub fn timed_out(name: impl Into<String>) -> Self {
        Self::CollectionTimedOut { name: name.into() }
    }

    /// Creates a database not found error.
    pub fn database_not_found(name: impl Into<String>) -> Self {
        Self::DatabaseNotFound { name: name.into() }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Returns true if the error means "the thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DatabaseNotFound { .. } | Self::CollectionNotFound { .. }
        )
    }

    /// Returns true if the caller should retry against a fresh collection.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::CollectionTimedOut { .. })
    }
}
