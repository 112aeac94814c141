//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A record key component was empty or otherwise unusable.
    #[error("invalid record key: {message}")]
    InvalidKey {
        /// Why the key was rejected.
        message: String,
    },

    /// A scan was requested with bounds that cannot produce results.
    #[error("invalid scan bounds on {sort_key}: {lo:?} > {hi:?}")]
    InvalidRange {
        /// The projection partition that was scanned.
        sort_key: String,
        /// Lower bound.
        lo: String,
        /// Upper bound.
        hi: String,
    },

    /// The store refused the operation (throttled, offline, injected fault).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns true if repeating the operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
