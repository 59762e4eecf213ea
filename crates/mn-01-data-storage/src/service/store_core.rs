//! State shared by both store families: the locked map and its persister.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use shared_persistence::{PersistenceStore, PersisterStats, RateLimitedPersister};
use tracing::debug;

use crate::domain::{DataFamily, DataStore, StorageError};

pub struct StoreCore<R: Clone + Send + Sync + 'static> {
    name: String,
    family: DataFamily,
    store: Arc<Mutex<DataStore<R>>>,
    persistence: Arc<dyn PersistenceStore<DataStore<R>>>,
    persister: RateLimitedPersister<DataStore<R>>,
}

impl<R: Clone + Send + Sync + 'static> StoreCore<R> {
    pub fn new(
        name: impl Into<String>,
        family: DataFamily,
        persistence: Arc<dyn PersistenceStore<DataStore<R>>>,
        persist_interval: std::time::Duration,
    ) -> Self {
        let store = Arc::new(Mutex::new(DataStore::new()));
        let snapshot_source = store.clone();
        // Deep clone under the lock, the write itself happens outside it.
        let persister = RateLimitedPersister::new(persistence.clone(), persist_interval, move || {
            snapshot_source.lock().clone()
        });
        Self {
            name: name.into(),
            family,
            store,
            persistence,
            persister,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> DataFamily {
        self.family
    }

    /// The single lock all mutations of this store go through.
    pub fn lock(&self) -> MutexGuard<'_, DataStore<R>> {
        self.store.lock()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> DataStore<R> {
        self.store.lock().clone()
    }

    pub async fn load(&self) -> Result<Option<DataStore<R>>, StorageError> {
        self.persistence
            .load()
            .await
            .map_err(|e| StorageError::persistence(&self.name, e))
    }

    /// Atomically replace the in-memory map.
    pub fn apply_persisted(&self, store: DataStore<R>) {
        let entries = store.len();
        *self.store.lock() = store;
        debug!(store = %self.name, entries, "Applied persisted store");
    }

    pub fn request_persist(&self) {
        self.persister.request_persist();
    }

    pub async fn flush(&self) -> Result<(), StorageError> {
        self.persister
            .flush()
            .await
            .map_err(|e| StorageError::persistence(&self.name, e))
    }

    pub fn persister_stats(&self) -> PersisterStats {
        self.persister.stats()
    }
}
