//! todocache Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for records and create payloads
//! - Fixtures for common scenarios
//! - Assertions on encoded response bodies

// Re-export mock storage from its source crate
pub use todocache_storage::MockTodoStore;

pub use todocache_core::{NewTodo, StoreError, StoreResult, Timestamp, Todo, TodoId};

use chrono::{TimeZone, Utc};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating todocache records.

    use super::*;
    use proptest::prelude::*;

    /// Generate a Timestamp within 2020-2030, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a store-assigned id.
    pub fn arb_todo_id() -> impl Strategy<Value = TodoId> {
        1..=i32::MAX
    }

    /// Generate a non-blank title, including quotes and non-ASCII text.
    pub fn arb_title() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 \"\\\\éü✓]{0,40}".prop_map(|s| format!("t{}", s))
    }

    /// Generate a complete record.
    pub fn arb_todo() -> impl Strategy<Value = Todo> {
        (arb_todo_id(), arb_title(), any::<bool>(), arb_timestamp(), 0i64..86_400).prop_map(
            |(id, title, completed, created_at, age)| Todo {
                id,
                title,
                completed,
                created_at,
                updated_at: created_at + chrono::Duration::seconds(age),
            },
        )
    }

    /// Generate a create payload, with or without client timestamps.
    pub fn arb_new_todo() -> impl Strategy<Value = NewTodo> {
        (
            arb_title(),
            any::<bool>(),
            proptest::option::of(arb_timestamp()),
            proptest::option::of(arb_timestamp()),
        )
            .prop_map(|(title, completed, created_at, updated_at)| NewTodo {
                title,
                completed,
                created_at,
                updated_at,
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made records for scenario tests.

    use super::*;

    /// Fixed instant used by every fixture: 2024-01-02T03:04:05Z.
    pub fn fixture_time() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// An open todo with a fixed timestamp.
    pub fn todo_fixture(id: TodoId, title: &str) -> Todo {
        Todo {
            id,
            title: title.to_string(),
            completed: false,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        }
    }

    /// The scenario store: a single open record `{id: 1, title: "buy milk"}`.
    pub fn buy_milk_store() -> MockTodoStore {
        MockTodoStore::with_todos([todo_fixture(1, "buy milk")])
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on JSON response bodies.

    use super::*;

    /// Assert a body decodes to a record with `id`, and return it.
    pub fn assert_todo_body(body: &[u8], id: TodoId) -> Todo {
        let todo: Todo = serde_json::from_slice(body).unwrap_or_else(|e| {
            panic!(
                "body is not a todo ({}): {}",
                e,
                String::from_utf8_lossy(body)
            )
        });
        assert_eq!(todo.id, id, "unexpected record id");
        todo
    }

    /// Assert a body decodes to a record collection, and return it.
    pub fn assert_collection_body(body: &[u8]) -> Vec<Todo> {
        serde_json::from_slice(body).unwrap_or_else(|e| {
            panic!(
                "body is not a todo collection ({}): {}",
                e,
                String::from_utf8_lossy(body)
            )
        })
    }

    /// Assert a store result is `NotFound`.
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StoreResult<T>) {
        match result {
            Err(err) => assert!(err.is_not_found(), "expected NotFound, got {:?}", err),
            Ok(value) => panic!("expected NotFound, got Ok({:?})", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_record_json_round_trips(todo in arb_todo()) {
            let bytes = todo.to_json_bytes().unwrap();
            let decoded = assertions::assert_todo_body(&bytes, todo.id);
            prop_assert_eq!(decoded, todo);
        }

        #[test]
        fn prop_new_todo_keeps_client_timestamps(new in arb_new_todo(), id in arb_todo_id()) {
            let now = fixtures::fixture_time();
            let todo = new.clone().into_todo(id, now);
            prop_assert_eq!(todo.created_at, new.created_at.unwrap_or(now));
            prop_assert!(!todo.title.trim().is_empty());
        }
    }

    #[test]
    fn test_buy_milk_fixture() {
        let store = fixtures::buy_milk_store();
        assert_eq!(store.len(), 1);
    }
}
