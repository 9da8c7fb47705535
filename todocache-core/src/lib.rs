//! todocache Core - Record Types
//!
//! Pure data structures shared by every other crate in the workspace.
//! A todo record is addressed by its integer `id` alone; the cache layer only
//! ever sees the decimal string form of that id and the record's canonical
//! JSON bytes.

pub mod error;

pub use error::{StoreError, StoreResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Store-assigned record identifier (`SERIAL` in Postgres).
pub type TodoId = i32;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Reserved cache key addressing the cached representation of the whole
/// collection. Never a valid record id: the store assigns ids from 1.
pub const COLLECTION_KEY: &str = "0";

/// Parse a cache or query key into a record id.
///
/// Only the canonical decimal form of a positive id is accepted, so every
/// record has exactly one cache key. Any other key cannot address a record and
/// is reported as [`StoreError::NotFound`] rather than as a backend failure.
pub fn parse_key(key: &str) -> StoreResult<TodoId> {
    match key.parse::<TodoId>() {
        Ok(id) if id > 0 && key == key_for(id) => Ok(id),
        _ => Err(StoreError::not_found(key)),
    }
}

/// String form of an id as used for cache addressing.
pub fn key_for(id: TodoId) -> String {
    id.to_string()
}

// ============================================================================
// RECORDS
// ============================================================================

/// One todo item as persisted in the store.
///
/// Field order is the canonical JSON encoding: `id`, `title`, `completed`,
/// `created_at`, `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub completed: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Todo {
    /// Canonical byte encoding stored in the cache and returned to clients.
    pub fn to_json_bytes(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(StoreError::from)
    }
}

/// Encode a collection of records; an empty collection encodes as `[]`.
pub fn encode_collection(todos: &[Todo]) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(todos).map_err(StoreError::from)
}

/// Payload accepted when creating a record.
///
/// Any `id` present in the request body is ignored; the store assigns it.
/// Missing timestamps are filled in by the store at insert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Materialize the record the store will hold, stamping missing
    /// timestamps with `now`.
    pub fn into_todo(self, id: TodoId, now: Timestamp) -> Todo {
        let created_at = self.created_at.unwrap_or(now);
        Todo {
            id,
            title: self.title,
            completed: self.completed,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}
