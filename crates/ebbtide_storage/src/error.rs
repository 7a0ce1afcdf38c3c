//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The blob name contains characters the store cannot represent.
    #[error("invalid blob name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The stored blob could not be interpreted.
    #[error("blob {name} corrupted: {message}")]
    Corrupted {
        /// Blob name.
        name: String,
        /// Description of the corruption.
        message: String,
    },
}

impl StorageError {
    /// Creates a corruption error for the given blob.
    pub fn corrupted(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            name: name.into(),
            message: message.into(),
        }
    }
}
