//! Error types for the state store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur reading or writing sync state.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file I/O failed.
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file contents could not be parsed.
    #[error("state codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The state path exists but is not usable.
    #[error("invalid state path: {0}")]
    InvalidPath(String),
}
