//! Cache-aside read path.
//!
//! Every read asks the cache group first. Any cache failure, a plain miss
//! included, is absorbed here and answered by a direct store read whose
//! result is never written back. Clients cannot tell the two apart.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use todocache_core::{encode_collection, parse_key, COLLECTION_KEY};
use todocache_distcache::{CacheError, Group};
use todocache_storage::TodoStore;

use crate::error::ApiResult;
use crate::telemetry::metrics;

/// The lookup half of a cache group, as seen by the read path.
#[async_trait]
pub trait CacheLookup: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<Bytes, CacheError>;
}

#[async_trait]
impl CacheLookup for Group {
    async fn lookup(&self, key: &str) -> Result<Bytes, CacheError> {
        self.get(key).await.map(|view| view.to_bytes())
    }
}

/// Which request shape a lookup served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupKind {
    Single,
    Collection,
}

impl LookupKind {
    fn as_str(self) -> &'static str {
        match self {
            LookupKind::Single => "single",
            LookupKind::Collection => "collection",
        }
    }
}

/// Routes reads between the cache group and the store.
pub struct ReadCoordinator {
    cache: Arc<dyn CacheLookup>,
    store: Arc<dyn TodoStore>,
}

impl ReadCoordinator {
    pub fn new(cache: Arc<dyn CacheLookup>, store: Arc<dyn TodoStore>) -> Self {
        Self { cache, store }
    }

    /// JSON bytes for the record addressed by `key`.
    ///
    /// Cached bytes are returned verbatim. On fallback a missing record is
    /// `NotFound` and a store failure is a backend error.
    pub async fn get_one(&self, key: &str) -> ApiResult<Bytes> {
        if let Some(bytes) = self.from_cache(LookupKind::Single, key).await {
            return Ok(bytes);
        }

        let id = parse_key(key)?;
        let todo = self.store.fetch_one(id).await?;
        tracing::debug!(key, source = "store", "served record");
        Ok(Bytes::from(todo.to_json_bytes()?))
    }

    /// JSON array of every record; `[]` when the store is empty.
    pub async fn get_all(&self) -> ApiResult<Bytes> {
        if let Some(bytes) = self
            .from_cache(LookupKind::Collection, COLLECTION_KEY)
            .await
        {
            return Ok(bytes);
        }

        let todos = self.store.fetch_all().await?;
        tracing::debug!(count = todos.len(), source = "store", "served collection");
        Ok(Bytes::from(encode_collection(&todos)?))
    }

    async fn from_cache(&self, kind: LookupKind, key: &str) -> Option<Bytes> {
        let result = self.cache.lookup(key).await;
        if let Some(m) = metrics() {
            m.record_cache_lookup(kind.as_str(), result.is_ok());
        }

        match result {
            Ok(bytes) => {
                tracing::debug!(key, kind = kind.as_str(), source = "cache", "cache hit");
                Some(bytes)
            }
            Err(err) => {
                tracing::debug!(
                    key,
                    kind = kind.as_str(),
                    error = %err,
                    "cache lookup failed, reading store"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use todocache_storage::MockTodoStore;
    use todocache_test_utils::fixtures::todo_fixture;

    /// Cache that serves a fixed map and fails every other key.
    #[derive(Default)]
    struct StaticCache {
        entries: HashMap<String, Bytes>,
        seen: Mutex<Vec<String>>,
    }

    impl StaticCache {
        fn with(entries: &[(&str, &str)]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), Bytes::from(v.to_string())))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CacheLookup for StaticCache {
        async fn lookup(&self, key: &str) -> Result<Bytes, CacheError> {
            self.seen.lock().unwrap().push(key.to_string());
            self.entries
                .get(key)
                .cloned()
                .ok_or_else(|| CacheError::peer("http://down:1", "connection refused"))
        }
    }

    fn coordinator(cache: StaticCache, store: MockTodoStore) -> (ReadCoordinator, Arc<StaticCache>) {
        let cache = Arc::new(cache);
        let reads = ReadCoordinator::new(cache.clone(), Arc::new(store));
        (reads, cache)
    }

    #[tokio::test]
    async fn test_cache_hit_is_returned_verbatim_without_store_read() {
        let store = MockTodoStore::with_todos([todo_fixture(1, "buy milk")]);
        let (reads, _) = coordinator(StaticCache::with(&[("1", "cached-bytes")]), store.clone());

        let body = reads.get_one("1").await.unwrap();
        assert_eq!(&body[..], b"cached-bytes");
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_store() {
        let todo = todo_fixture(1, "buy milk");
        let store = MockTodoStore::with_todos([todo.clone()]);
        let (reads, _) = coordinator(StaticCache::default(), store.clone());

        let body = reads.get_one("1").await.unwrap();
        assert_eq!(body.to_vec(), todo.to_json_bytes().unwrap());
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found_after_fallback() {
        let (reads, _) = coordinator(StaticCache::default(), MockTodoStore::new());
        let err = reads.get_one("2").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);

        let err = reads.get_one("not-a-number").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[tokio::test]
    async fn test_store_failure_is_database_error() {
        let store = MockTodoStore::with_todos([todo_fixture(1, "buy milk")]);
        store.set_failing(true);
        let (reads, _) = coordinator(StaticCache::default(), store);

        assert_eq!(reads.get_one("1").await.unwrap_err().code, ErrorCode::DatabaseError);
        assert_eq!(reads.get_all().await.unwrap_err().code, ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn test_collection_asks_sentinel_then_reads_store() {
        let store = MockTodoStore::with_todos([todo_fixture(1, "a"), todo_fixture(2, "b")]);
        let (reads, cache) = coordinator(StaticCache::default(), store.clone());

        let body = reads.get_all().await.unwrap();
        let decoded: Vec<todocache_core::Todo> = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(*cache.seen.lock().unwrap(), vec![COLLECTION_KEY.to_string()]);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_collection_is_empty_array() {
        let (reads, _) = coordinator(StaticCache::default(), MockTodoStore::new());
        let body = reads.get_all().await.unwrap();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_cached_collection_is_served() {
        let (reads, _) = coordinator(
            StaticCache::with(&[(COLLECTION_KEY, "[{\"id\":1}]")]),
            MockTodoStore::new(),
        );
        let body = reads.get_all().await.unwrap();
        assert_eq!(&body[..], b"[{\"id\":1}]");
    }
}
