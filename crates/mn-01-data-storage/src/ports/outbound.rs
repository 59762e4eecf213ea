//! # Outbound Ports (Driven Ports)
//!
//! Production: `FileStoreProvider` (adapters/file.rs)
//! Testing: `InMemoryStoreProvider` (adapters/memory.rs)

use std::sync::Arc;

use shared_persistence::PersistenceStore;

use crate::domain::{AddAppendOnlyDataRequest, AuthenticatedDataRequest, DataFamily, DataStore};

pub type AppendOnlyPersistence = Arc<dyn PersistenceStore<DataStore<AddAppendOnlyDataRequest>>>;
pub type AuthenticatedPersistence = Arc<dyn PersistenceStore<DataStore<AuthenticatedDataRequest>>>;

/// Hands out the durable home of each store.
pub trait StorePersistenceProvider: Send + Sync {
    fn append_only(&self, store_name: &str) -> AppendOnlyPersistence;

    fn authenticated(&self, store_name: &str) -> AuthenticatedPersistence;

    /// Stores of `family` that have been persisted before, loaded eagerly on start.
    fn persisted_store_names(&self, family: DataFamily) -> Vec<String>;
}
