//! Error types for record store operations

use thiserror::Error;

/// Record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Todo not found: {key}")]
    NotFound { key: String },

    #[error("Store backend failed: {reason}")]
    Backend { reason: String },

    #[error("Record codec failed: {reason}")]
    Codec { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// True when the record is absent, as opposed to the store failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec {
            reason: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
