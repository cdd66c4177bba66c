//! Error types for mosaic.

use thiserror::Error;

/// Result type alias using mosaic's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mosaic search operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stack not found
    #[error("Stack not found: {0}")]
    StackNotFound(uuid::Uuid),

    /// Request is missing a parameter its mode requires, or carries an invalid value
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Request exceeded its deadline
    #[error("Search timed out after {0} ms")]
    Timeout(u64),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
