//! Write path: new records go straight to the store.
//!
//! The cache is neither populated nor invalidated here. Cached collection
//! and record entries stay stale until the cache engine expires them.

use std::sync::Arc;

use todocache_core::{NewTodo, TodoId};
use todocache_storage::TodoStore;

use crate::error::ApiResult;

pub struct WriteCoordinator {
    store: Arc<dyn TodoStore>,
}

impl WriteCoordinator {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    /// Decode a request body and append the record it describes.
    ///
    /// Any decode failure is rejected before the store is touched.
    pub async fn create(&self, body: &[u8]) -> ApiResult<TodoId> {
        let new_todo: NewTodo = serde_json::from_slice(body)?;

        let id = self.store.insert(&new_todo).await?;
        tracing::info!(id, title = %new_todo.title, "created todo");
        Ok(id)
    }
}
