//! Error types for vitalsync.

use thiserror::Error;

/// Errors raised by the queue engine, its storage and the CLI.
#[derive(Debug, Error)]
pub enum VitalSyncError {
    /// The durable store could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded, saved or resolved.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A persisted value or payload could not be (de)serialized.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
