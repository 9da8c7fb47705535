//! todocache Storage - Record Store Trait and Mock Implementation
//!
//! Defines the translation layer between record identifiers/payloads and the
//! backing relational store. No caching, retry or batching belongs here: every
//! call is exactly one store round trip.
//!
//! The Postgres implementation lives in todocache-api.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use todocache_core::{NewTodo, StoreError, StoreResult, Todo, TodoId};

/// Async record store contract.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Fetch a single record by id.
    async fn fetch_one(&self, id: TodoId) -> StoreResult<Todo>;

    /// Fetch every record, ordered by id.
    async fn fetch_all(&self) -> StoreResult<Vec<Todo>>;

    /// Append a new record and return its store-assigned id.
    async fn insert(&self, todo: &NewTodo) -> StoreResult<TodoId>;

    /// Check that the store is reachable.
    async fn ping(&self) -> StoreResult<()>;
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

/// In-memory store for tests and local development.
///
/// Ids are assigned sequentially from 1. Store failures can be forced with
/// [`MockTodoStore::set_failing`] to exercise error paths.
#[derive(Debug, Default, Clone)]
pub struct MockTodoStore {
    todos: Arc<RwLock<BTreeMap<TodoId, Todo>>>,
    next_id: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
}

impl MockTodoStore {
    /// Create a new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store pre-populated with records (ids are kept as given).
    pub fn with_todos(todos: impl IntoIterator<Item = Todo>) -> Self {
        let store = Self::new();
        let mut max_id = 0;
        if let Ok(mut map) = store.todos.write() {
            for todo in todos {
                max_id = max_id.max(todo.id);
                map.insert(todo.id, todo);
            }
        }
        store.next_id.store(max_id as usize, Ordering::SeqCst);
        store
    }

    /// Make every subsequent call fail with a backend error (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.todos.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetch calls (single and collection) served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::backend("mock store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TodoStore for MockTodoStore {
    async fn fetch_one(&self, id: TodoId) -> StoreResult<Todo> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let todos = self.todos.read().map_err(|_| StoreError::LockPoisoned)?;
        todos
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id.to_string()))
    }

    async fn fetch_all(&self) -> StoreResult<Vec<Todo>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let todos = self.todos.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(todos.values().cloned().collect())
    }

    async fn insert(&self, todo: &NewTodo) -> StoreResult<TodoId> {
        self.check_available()?;
        let mut todos = self.todos.write().map_err(|_| StoreError::LockPoisoned)?;
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1) as TodoId;
        todos.insert(id, todo.clone().into_todo(id, Utc::now()));
        Ok(id)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}
