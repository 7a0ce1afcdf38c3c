//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the remote.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote did not answer in time.
    #[error("operation timed out")]
    Timeout,

    /// The remote refused the change (e.g. a constraint violation).
    #[error("remote rejected change: {0}")]
    Rejected(String),

    /// No authenticated identity is available to own new rows.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Connectivity is absent.
    #[error("offline")]
    Offline,

    /// No async runtime is available to run background tasks.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// Local store error during sync.
    #[error("local store error: {0}")]
    Core(#[from] ebbtide_core::CoreError),
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::Offline => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::network_retryable("connection reset").is_retryable());
        assert!(!SyncError::network_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Offline.is_retryable());
        assert!(!SyncError::Rejected("duplicate key".into()).is_retryable());
        assert!(!SyncError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(SyncError::NotAuthenticated.to_string(), "not authenticated");
        assert!(SyncError::Rejected("check constraint".into())
            .to_string()
            .contains("check constraint"));
    }
}
