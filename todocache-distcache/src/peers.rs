//! Peer selection and remote fetch traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheResult;

/// Fetches a value for a group/key from one remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Address of the peer, used in logs and errors.
    fn addr(&self) -> &str;

    async fn get(&self, group: &str, key: &str) -> CacheResult<Bytes>;
}

/// Locates the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Peer owning `key`, or `None` when this node owns it.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Picker for single-node deployments: every key is owned locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        None
    }
}
