//! In-memory storage adapter for tests and embedding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::traits::StorageAdapter;

/// A [`StorageAdapter`] holding the snapshot in memory.
///
/// Counts every `load` and `store` call so callers can observe how often the
/// cache reaches storage.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    value: Mutex<Option<Value>>,
    loads: AtomicUsize,
    stores: AtomicUsize,
}

impl InMemoryStorage {
    /// An empty store: the first `load` returns `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with a snapshot.
    pub fn with_value(value: Value) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            ..Self::default()
        }
    }

    /// The current snapshot.
    pub fn value(&self) -> Option<Value> {
        self.value.lock().expect("lock poisoned").clone()
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of completed `store` calls so far.
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn load(&self) -> Option<Value> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.value()
    }

    async fn store(&self, state: Value) -> StorageResult<()> {
        *self.value.lock().expect("lock poisoned") = Some(state);
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
