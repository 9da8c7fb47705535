//! Shared application state for the API router.

use std::sync::Arc;
use std::time::Instant;

use todocache_storage::TodoStore;

use crate::reads::{CacheLookup, ReadCoordinator};
use crate::writes::WriteCoordinator;

/// Everything an API request handler may touch.
///
/// Built once at startup from the process-wide cache group and store, then
/// cloned cheaply into every request.
#[derive(Clone)]
pub struct AppState {
    pub reads: Arc<ReadCoordinator>,
    pub writes: Arc<WriteCoordinator>,
    /// Used directly only by the readiness check.
    pub store: Arc<dyn TodoStore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: Arc<dyn CacheLookup>, store: Arc<dyn TodoStore>) -> Self {
        Self {
            reads: Arc::new(ReadCoordinator::new(cache, Arc::clone(&store))),
            writes: Arc::new(WriteCoordinator::new(Arc::clone(&store))),
            store,
            start_time: Instant::now(),
        }
    }
}
