//! Duplicate call suppression for concurrent loads of the same key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// Coalesces concurrent calls for one key into a single execution.
///
/// The first caller for a key runs its future; callers arriving while it is
/// in flight wait for and share its result. Once a call completes the key is
/// forgotten, so later callers start a fresh execution. If the running caller
/// is cancelled, one of the waiters takes over.
pub struct FlightGroup<T> {
    calls: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` for `key` unless an identical call is already in flight.
    ///
    /// Returns the result and whether this caller joined an existing call.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (cell, joined) = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(cell) => (Arc::clone(cell), true),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    calls.insert(key.to_string(), Arc::clone(&cell));
                    (cell, false)
                }
            }
        };

        let value = cell.get_or_init(f).await.clone();

        let mut calls = self.calls.lock();
        if calls
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            calls.remove(key);
        }

        (value, joined)
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_call() {
        let group = FlightGroup::new();
        let (value, joined) = group.run("k", || async { 7 }).await;
        assert_eq!(value, 7);
        assert!(!joined);
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_coalesced() {
        let group = Arc::new(FlightGroup::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let group = Arc::clone(&group);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                group
                    .run("shared", || async move {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        "done".to_string()
                    })
                    .await
            }));
        }

        for handle in handles {
            let (value, _) = handle.await.unwrap();
            assert_eq!(value, "done");
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(group.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let group = FlightGroup::new();
        let executions = AtomicUsize::new(0);

        for _ in 0..3 {
            group
                .run("k", || async {
                    executions.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        assert_eq!(executions.load(Ordering::SeqCst), 3);
    }
}
