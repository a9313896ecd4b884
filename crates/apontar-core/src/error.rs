//! Error types for apontar-core

use thiserror::Error;

/// Result type alias using apontar-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in apontar-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The allocator could not find a free record ID
    #[error("Could not allocate a free record ID after {0} attempts")]
    IdSpaceExhausted(usize),

    /// Alert delivery error
    #[error("Alert error: {0}")]
    Alert(String),

    /// A store call outside the reconciler failed
    #[error("Store error: {0}")]
    Remote(#[from] crate::storage::RemoteError),
}
