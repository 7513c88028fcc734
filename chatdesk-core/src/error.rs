//! Error types for chatdesk-core

use thiserror::Error;

/// The main error type for store, settings and persistence operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The named session does not exist
    #[error("Chat '{0}' not found")]
    NotFound(String),

    /// A session with the requested name already exists
    #[error("A chat named '{0}' already exists")]
    NameConflict(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// A specialized Result type for chatdesk-core operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
