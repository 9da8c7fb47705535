//! Error types for cache group operations

use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by getters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`crate::Group`] lookups and peer plumbing.
///
/// Cloneable so a single in-flight load can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache key is required")]
    EmptyKey,

    #[error("getter failed for key {key}: {source}")]
    Getter {
        key: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("peer {peer} failed: {reason}")]
    Peer { peer: String, reason: String },

    /// The owning peer ran its getter and the key does not exist.
    #[error("key {key} not found on peer {peer}")]
    PeerNotFound { peer: String, key: String },

    #[error("peers already registered for group {group}")]
    PeersAlreadyRegistered { group: String },

    #[error("no such group: {group}")]
    UnknownGroup { group: String },
}

impl CacheError {
    pub fn getter(key: impl Into<String>, source: BoxError) -> Self {
        Self::Getter {
            key: key.into(),
            source: Arc::from(source),
        }
    }

    pub fn peer(peer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Peer {
            peer: peer.into(),
            reason: reason.into(),
        }
    }

    /// Downcast the getter's original error, if this is a getter failure.
    pub fn getter_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Getter { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
