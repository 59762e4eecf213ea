//! In-memory persistence used by tests and ephemeral nodes.

use crate::errors::PersistenceError;
use crate::ports::PersistenceStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct InMemoryPersistence<T> {
    name: String,
    snapshot: Mutex<Option<T>>,
    writes: AtomicU64,
    fail_writes: AtomicBool,
}

impl<T> InMemoryPersistence<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot: Mutex::new(None),
            writes: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Start with a snapshot already stored.
    pub fn with_snapshot(name: impl Into<String>, snapshot: T) -> Self {
        let store = Self::new(name);
        *store.snapshot.lock() = Some(snapshot);
        store
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl<T: Clone> InMemoryPersistence<T> {
    pub fn current(&self) -> Option<T> {
        self.snapshot.lock().clone()
    }
}

#[async_trait]
impl<T> PersistenceStore<T> for InMemoryPersistence<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<T>, PersistenceError> {
        Ok(self.snapshot.lock().clone())
    }

    async fn store(&self, snapshot: T) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Injected);
        }
        *self.snapshot.lock() = Some(snapshot);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
