//! Consistent hash ring mapping cache keys to peer nodes.
//!
//! Each peer is placed on the ring `replicas` times under derived virtual
//! keys, so adding or removing one peer only moves the keys adjacent to its
//! points. Every node must be built from the same peer list for lookups to
//! agree across the deployment.

use std::collections::HashMap;

use twox_hash::XxHash64;

const HASH_SEED: u64 = 0;

/// Default number of virtual points per peer.
pub const DEFAULT_REPLICAS: usize = 50;

/// Hash function used to place keys and virtual nodes on the ring.
pub type HashFn = fn(&[u8]) -> u64;

fn xxhash(data: &[u8]) -> u64 {
    XxHash64::oneshot(HASH_SEED, data)
}

#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    points: Vec<u64>,
    owners: HashMap<u64, String>,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, xxhash)
    }

    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas: replicas.max(1),
            points: Vec::new(),
            owners: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add peers to the ring.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for replica in 0..self.replicas {
                let point = (self.hash)(format!("{}{}", replica, peer).as_bytes());
                self.points.push(point);
                self.owners.insert(point, peer.to_string());
            }
        }
        self.points.sort_unstable();
        self.points.dedup();
    }

    /// Peer owning `key`, or `None` when the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.points.partition_point(|&point| point < hash);
        let point = self.points[idx % self.points.len()];
        self.owners.get(&point).map(String::as_str)
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}
