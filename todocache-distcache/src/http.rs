//! HTTP peer pool: picks key owners and serves cache-protocol traffic.
//!
//! Peers talk to each other with a single request shape:
//! `GET {base_path}{group}/{key}` answered with the raw value bytes, 404
//! when the owner's getter reports the key absent (or the group is
//! unknown), and 500 for any other load failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use parking_lot::RwLock;

use crate::consistenthash::{HashRing, DEFAULT_REPLICAS};
use crate::error::{CacheError, CacheResult};
use crate::group::Group;
use crate::peers::{PeerGetter, PeerPicker};

/// Path prefix for peer requests.
pub const DEFAULT_BASE_PATH: &str = "/_distcache/";

/// Tuning for an [`HttpPool`].
#[derive(Debug, Clone)]
pub struct HttpPoolOptions {
    /// Path prefix for peer requests; must start and end with `/`.
    pub base_path: String,
    /// Virtual points per peer on the hash ring.
    pub replicas: usize,
    /// Deadline for one peer request.
    pub request_timeout: Duration,
}

impl Default for HttpPoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(2),
        }
    }
}

struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// The set of cache peers, including this node, addressed by base URL
/// (for example `http://localhost:8001`).
pub struct HttpPool {
    self_url: String,
    options: HttpPoolOptions,
    client: reqwest::Client,
    state: RwLock<PoolState>,
}

impl HttpPool {
    pub fn new(self_url: impl Into<String>) -> Self {
        Self::with_options(self_url, HttpPoolOptions::default())
    }

    pub fn with_options(self_url: impl Into<String>, options: HttpPoolOptions) -> Self {
        let replicas = options.replicas;
        Self {
            self_url: trim_url(&self_url.into()),
            options,
            client: reqwest::Client::new(),
            state: RwLock::new(PoolState {
                ring: HashRing::new(replicas),
                getters: HashMap::new(),
            }),
        }
    }

    /// Replace the peer set. Every node must be given the same list.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers.into_iter().map(|p| trim_url(p.as_ref())).collect();

        let mut ring = HashRing::new(self.options.replicas);
        ring.add(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter {
                    peer: peer.clone(),
                    base_url: format!("{}{}", peer, self.options.base_path),
                    client: self.client.clone(),
                    timeout: self.options.request_timeout,
                };
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        let mut state = self.state.write();
        state.ring = ring;
        state.getters = getters;

        tracing::info!(self_url = %self.self_url, peers = ?peers, "cache peers set");
    }

    /// Currently configured peers, sorted.
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.state.read().getters.keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Peer URL owning `key`, whether remote or this node.
    pub fn owner_of(&self, key: &str) -> Option<String> {
        self.state.read().ring.get(key).map(str::to_string)
    }

    /// Router serving peer requests for `groups` under the pool's base path.
    pub fn router(&self, groups: impl IntoIterator<Item = Group>) -> Router {
        let registry: HashMap<String, Group> = groups
            .into_iter()
            .map(|group| (group.name().to_string(), group))
            .collect();

        Router::new()
            .route(
                &format!("{}:group/:key", self.options.base_path),
                get(serve_key),
            )
            .with_state(Arc::new(registry))
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let owner = state.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }
        let getter = state.getters.get(owner)?;
        tracing::debug!(key, peer = owner, "picked remote peer");
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

/// Client for one remote peer.
pub struct HttpGetter {
    peer: String,
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[async_trait]
impl PeerGetter for HttpGetter {
    fn addr(&self) -> &str {
        &self.peer
    }

    async fn get(&self, group: &str, key: &str) -> CacheResult<Bytes> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CacheError::peer(&self.peer, e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CacheError::PeerNotFound {
                peer: self.peer.clone(),
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CacheError::peer(
                &self.peer,
                format!("server returned {}: {}", status, body.trim()),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| CacheError::peer(&self.peer, format!("reading response body: {}", e)))
    }
}

async fn serve_key(
    State(groups): State<Arc<HashMap<String, Group>>>,
    Path((group_name, key)): Path<(String, String)>,
) -> Response {
    let Some(group) = groups.get(&group_name) else {
        let err = CacheError::UnknownGroup {
            group: group_name.clone(),
        };
        return (StatusCode::NOT_FOUND, err.to_string()).into_response();
    };
    group.record_server_request();

    match group.get(&key).await {
        Ok(value) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value.to_bytes(),
        )
            .into_response(),
        Err(err) if group.is_not_found(&err) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::debug!(group = %group_name, key = %key, error = %err, "peer request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_is_never_picked() {
        let pool = HttpPool::new("http://localhost:8001");
        pool.set(["http://localhost:8001"]);

        for i in 0..100 {
            assert!(pool.pick_peer(&i.to_string()).is_none());
        }
    }

    #[test]
    fn test_remote_owner_is_picked() {
        let pool = HttpPool::new("http://localhost:8001");
        pool.set([
            "http://localhost:8001",
            "http://localhost:8002/",
            "http://localhost:8003",
        ]);

        assert_eq!(pool.peers().len(), 3);
        let mut remote = 0;
        for i in 0..300 {
            let key = i.to_string();
            let owner = pool.owner_of(&key).unwrap();
            match pool.pick_peer(&key) {
                Some(peer) => {
                    assert_eq!(peer.addr(), owner);
                    remote += 1;
                }
                None => assert_eq!(owner, "http://localhost:8001"),
            }
        }
        assert!(remote > 0);
    }

    #[test]
    fn test_empty_pool_picks_nothing() {
        let pool = HttpPool::new("http://localhost:8001");
        assert!(pool.pick_peer("1").is_none());
        assert!(pool.owner_of("1").is_none());
    }
}
