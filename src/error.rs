//! Error types for PESOS.

use thiserror::Error;

use crate::sync::service::RunError;

/// Common error type for PESOS.
#[derive(Error, Debug)]
pub enum PesosError {
    /// Database error.
    ///
    /// Errors from sqlx are automatically converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Synchronization run could not be started or failed as a whole.
    #[error("{0}")]
    Sync(#[from] RunError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PesosError {
    fn from(e: sqlx::Error) -> Self {
        PesosError::Database(e.to_string())
    }
}

/// Result type alias for PESOS operations.
pub type Result<T> = std::result::Result<T, PesosError>;
