//! Error types for the RozsDB server.

use rozsdb_core::CoreError;
use std::net::IpAddr;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the RozsDB server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The credential is unknown or lacks a permission.
    #[error("{0}")]
    Unauthorized(String),

    /// The peer address is not on the allow list.
    #[error("ip not allowed: {0}")]
    Forbidden(IpAddr),

    /// The connection limit has been reached.
    #[error("server is full")]
    Full,

    /// The byte stream does not contain a valid frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame decoded but the request is unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested document does not exist.
    #[error("Not found")]
    NotFound,

    /// Settings or credential files are unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error outside request decoding.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Creates an unauthorized error for a missing permission.
    pub fn missing_permission(permission: impl std::fmt::Display) -> Self {
        Self::Unauthorized(format!("Unauthorized: missing permission '{permission}'"))
    }

    /// Creates an unauthorized error for an unknown credential.
    pub fn unknown_user() -> Self {
        Self::Unauthorized("Unauthorized: User is not authorized".into())
    }

    /// Returns true if the connection must be closed after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Forbidden(_)
                | ServerError::Full
                | ServerError::MalformedFrame(_)
                | ServerError::Io(_)
        )
    }

    /// The message sent to the client in an error envelope.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::Unauthorized(message) | ServerError::InvalidRequest(message) => {
                message.clone()
            }
            ServerError::Forbidden(_) => {
                "Security Error: This ip is not allowed in this database.".into()
            }
            ServerError::Full => "Server is full".into(),
            ServerError::NotFound => "Not found".into(),
            ServerError::Core(CoreError::DatabaseNotFound { .. }) => "Database not found".into(),
            ServerError::Core(CoreError::CollectionTimedOut { .. }) => "Collection timeout".into(),
            ServerError::Core(CoreError::InvalidName { name, reason }) => {
                format!("Invalid collection name {name:?}: {reason}")
            }
            other => other.to_string(),
        }
    }
}
