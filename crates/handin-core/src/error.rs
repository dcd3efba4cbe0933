//! Error types for handin-core

use thiserror::Error;

/// Result type alias using handin-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in handin-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Losing side of last-write-wins or an optimistic-lock mismatch
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A document with this id already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
