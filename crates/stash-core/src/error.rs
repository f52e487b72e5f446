//! Error types for the stash item repository.

use thiserror::Error;

/// Result type alias using stash's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stash operations.
///
/// Every variant is terminal for the request that produced it; the HTTP
/// layer decides the status code, nothing here retries.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A required field was empty or missing
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request payload could not be decoded (e.g. malformed base64 file)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Identifier generation failed (clock or entropy source)
    #[error("Identifier generation error: {0}")]
    IdGeneration(String),

    /// A stored value could not be decoded into its domain type
    #[error("Row decode error: {0}")]
    RowDecode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
