//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The user closed the authentication window.
    ///
    /// Expected user behavior; callers log this quietly instead of
    /// treating it as an unexpected failure.
    #[error("authentication window closed by user")]
    AuthWindowClosed,

    /// The authentication provider denied the request.
    #[error("authentication denied: {0}")]
    AuthDenied(String),

    /// The server kept rejecting our credentials.
    #[error("token rejected after {attempts} re-authentication attempts")]
    AuthRejected {
        /// How many automatic re-authentications were tried.
        attempts: u32,
    },

    /// The server returned an application-level error.
    #[error("server error: {0}")]
    Server(String),

    /// The remote snapshot was missing an expected file or was malformed.
    #[error("malformed snapshot: {0}")]
    Snapshot(String),

    /// State store failure.
    #[error("state store error: {0}")]
    Store(#[from] edsync_store::StoreError),

    /// JSON encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The host editor rejected an operation.
    #[error("host error: {0}")]
    Host(String),

    /// A settings file could not be applied.
    #[error("failed to apply {name}: {reason}")]
    FileApply {
        /// Logical file name.
        name: String,
        /// Why the write failed.
        reason: String,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error reflects expected user behavior and
    /// should not be logged as unexpected.
    pub fn is_quiet(&self) -> bool {
        matches!(self, SyncError::AuthWindowClosed)
    }
}
