//! Cache fill function: the only path by which store data enters the cache.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use todocache_core::{parse_key, StoreError, StoreResult, COLLECTION_KEY};
use todocache_distcache::{BoxError, Getter};
use todocache_storage::TodoStore;

/// Loads one record's canonical JSON bytes from the store.
///
/// Holds the store explicitly and is handed to the cache group at
/// construction. Errors are propagated unchanged: whatever bytes a fill
/// returns are cached, so absence must stay an error.
pub struct TodoFiller {
    store: Arc<dyn TodoStore>,
}

impl TodoFiller {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    /// Produce the bytes for `key`.
    ///
    /// The collection sentinel is declined without a store call: the
    /// collection is only ever served by the read path's direct fallback.
    pub async fn fill(&self, key: &str) -> StoreResult<Bytes> {
        if key == COLLECTION_KEY {
            return Err(StoreError::not_found(key));
        }
        let id = parse_key(key)?;

        tracing::debug!(key, "[SlowDB] search key");
        let todo = self.store.fetch_one(id).await?;
        Ok(Bytes::from(todo.to_json_bytes()?))
    }
}

#[async_trait]
impl Getter for TodoFiller {
    async fn get(&self, key: &str) -> Result<Bytes, BoxError> {
        self.fill(key).await.map_err(|err| Box::new(err) as BoxError)
    }

    fn is_not_found(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
        err.downcast_ref::<StoreError>().is_some_and(StoreError::is_not_found)
    }
}
