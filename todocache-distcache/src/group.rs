//! Cache groups: a named, byte-budgeted namespace bound to one getter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::byteview::ByteView;
use crate::error::{BoxError, CacheError, CacheResult};
use crate::peers::PeerPicker;
use crate::singleflight::FlightGroup;

/// Loads the value for a key that is not cached anywhere in the deployment.
///
/// Whatever bytes a getter returns are cached, so a getter must report
/// absence as an error rather than produce a placeholder.
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Bytes, BoxError>;

    /// True when `err`, returned by this getter, means the key does not
    /// exist. Owners answer such loads with 404 and the asking node does not
    /// repeat the load locally.
    fn is_not_found(&self, _err: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
        false
    }
}

/// Sizing options for a group.
#[derive(Debug, Clone)]
pub struct GroupOptions {
    /// Budget for the local cache, counting key and value bytes.
    pub cache_bytes: u64,
    /// Expire entries this long after they were loaded.
    pub ttl: Option<Duration>,
}

impl GroupOptions {
    pub fn new(cache_bytes: u64) -> Self {
        Self {
            cache_bytes,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Stats {
    gets: Counter,
    cache_hits: Counter,
    peer_loads: Counter,
    peer_not_found: Counter,
    peer_errors: Counter,
    loads: Counter,
    loads_deduped: Counter,
    local_loads: Counter,
    local_load_errs: Counter,
    server_requests: Counter,
}

/// Point-in-time snapshot of a group's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Any `get` request, including from peers.
    pub gets: u64,
    /// Served from the local cache.
    pub cache_hits: u64,
    /// Values fetched from the owning peer.
    pub peer_loads: u64,
    /// Keys the owning peer reported as absent.
    pub peer_not_found: u64,
    pub peer_errors: u64,
    /// Cache misses that went through the load path.
    pub loads: u64,
    /// Misses that joined a load already in flight.
    pub loads_deduped: u64,
    /// Values produced by this node's getter.
    pub local_loads: u64,
    pub local_load_errs: u64,
    /// Requests received from peers over HTTP.
    pub server_requests: u64,
}

struct GroupInner {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: Cache<String, ByteView>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flights: FlightGroup<CacheResult<ByteView>>,
    stats: Stats,
}

/// A cache namespace shared by every node that registers the same name.
///
/// Cloning a `Group` yields another handle to the same cache; it is meant to
/// be built once at startup and handed to every component that needs it.
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Group {
    pub fn new(name: impl Into<String>, options: GroupOptions, getter: Arc<dyn Getter>) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(options.cache_bytes)
            .weigher(|key: &String, value: &ByteView| -> u32 {
                u32::try_from(key.len() + value.len()).unwrap_or(u32::MAX)
            })
            .eviction_policy(EvictionPolicy::lru());
        if let Some(ttl) = options.ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            inner: Arc::new(GroupInner {
                name: name.into(),
                getter,
                main_cache: builder.build(),
                peers: OnceLock::new(),
                flights: FlightGroup::new(),
                stats: Stats::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register the peer picker used to route keys to their owners.
    ///
    /// Can only be done once per group.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> CacheResult<()> {
        self.inner
            .peers
            .set(peers)
            .map_err(|_| CacheError::PeersAlreadyRegistered {
                group: self.inner.name.clone(),
            })
    }

    /// Look up `key`, loading it from the owning peer or the getter on a miss.
    pub async fn get(&self, key: &str) -> CacheResult<ByteView> {
        self.inner.stats.gets.inc();
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        if let Some(value) = self.lookup_cache(key) {
            tracing::debug!(group = %self.inner.name, key, "cache hit");
            return Ok(value);
        }

        self.load(key).await
    }

    pub fn stats(&self) -> CacheStats {
        let stats = &self.inner.stats;
        CacheStats {
            gets: stats.gets.get(),
            cache_hits: stats.cache_hits.get(),
            peer_loads: stats.peer_loads.get(),
            peer_not_found: stats.peer_not_found.get(),
            peer_errors: stats.peer_errors.get(),
            loads: stats.loads.get(),
            loads_deduped: stats.loads_deduped.get(),
            local_loads: stats.local_loads.get(),
            local_load_errs: stats.local_load_errs.get(),
            server_requests: stats.server_requests.get(),
        }
    }

    /// True when `key` is held in this node's local cache.
    pub fn contains_local(&self, key: &str) -> bool {
        self.inner.main_cache.contains_key(key)
    }

    pub(crate) fn record_server_request(&self) {
        self.inner.stats.server_requests.inc();
    }

    /// True when `err` is this group's getter reporting an absent key.
    pub(crate) fn is_not_found(&self, err: &CacheError) -> bool {
        match err {
            CacheError::Getter { source, .. } => self.inner.getter.is_not_found(&**source),
            _ => false,
        }
    }

    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        let value = self.inner.main_cache.get(key)?;
        self.inner.stats.cache_hits.inc();
        Some(value)
    }

    async fn load(&self, key: &str) -> CacheResult<ByteView> {
        self.inner.stats.loads.inc();
        let (result, joined) = self
            .inner
            .flights
            .run(key, || self.load_once(key))
            .await;
        if joined {
            self.inner.stats.loads_deduped.inc();
        }
        result
    }

    async fn load_once(&self, key: &str) -> CacheResult<ByteView> {
        // A previous flight may have filled the key between our miss and now.
        if let Some(value) = self.lookup_cache(key) {
            return Ok(value);
        }

        if let Some(peer) = self.inner.peers.get().and_then(|p| p.pick_peer(key)) {
            match peer.get(&self.inner.name, key).await {
                Ok(bytes) => {
                    self.inner.stats.peer_loads.inc();
                    return Ok(ByteView::from(bytes));
                }
                Err(err @ CacheError::PeerNotFound { .. }) => {
                    self.inner.stats.peer_not_found.inc();
                    tracing::debug!(
                        group = %self.inner.name,
                        key,
                        peer = peer.addr(),
                        "not found on owning peer"
                    );
                    return Err(err);
                }
                Err(err) => {
                    self.inner.stats.peer_errors.inc();
                    tracing::warn!(
                        group = %self.inner.name,
                        key,
                        peer = peer.addr(),
                        error = %err,
                        "peer load failed, loading locally"
                    );
                }
            }
        }

        self.load_locally(key).await
    }

    async fn load_locally(&self, key: &str) -> CacheResult<ByteView> {
        match self.inner.getter.get(key).await {
            Ok(bytes) => {
                self.inner.stats.local_loads.inc();
                let value = ByteView::from(bytes);
                self.inner
                    .main_cache
                    .insert(key.to_string(), value.clone());
                Ok(value)
            }
            Err(err) => {
                self.inner.stats.local_load_errs.inc();
                Err(CacheError::getter(key, err))
            }
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.inner.name)
            .field("entries", &self.inner.main_cache.entry_count())
            .finish()
    }
}
