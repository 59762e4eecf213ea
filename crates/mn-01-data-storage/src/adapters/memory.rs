//! In-memory stores for tests and ephemeral nodes.
//!
//! Reopening a store name returns the same backing snapshot, so a service
//! rebuilt on the same provider sees what the previous one persisted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_persistence::InMemoryPersistence;

use crate::domain::{AddAppendOnlyDataRequest, AuthenticatedDataRequest, DataFamily, DataStore};
use crate::ports::{AppendOnlyPersistence, AuthenticatedPersistence, StorePersistenceProvider};

type AppendOnlyMemory = Arc<InMemoryPersistence<DataStore<AddAppendOnlyDataRequest>>>;
type AuthenticatedMemory = Arc<InMemoryPersistence<DataStore<AuthenticatedDataRequest>>>;

#[derive(Default)]
pub struct InMemoryStoreProvider {
    append_only: Mutex<HashMap<String, AppendOnlyMemory>>,
    authenticated: Mutex<HashMap<String, AuthenticatedMemory>>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_only_backend(&self, store_name: &str) -> AppendOnlyMemory {
        self.append_only
            .lock()
            .entry(store_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryPersistence::new(store_name)))
            .clone()
    }

    pub fn authenticated_backend(&self, store_name: &str) -> AuthenticatedMemory {
        self.authenticated
            .lock()
            .entry(store_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryPersistence::new(store_name)))
            .clone()
    }
}

impl StorePersistenceProvider for InMemoryStoreProvider {
    fn append_only(&self, store_name: &str) -> AppendOnlyPersistence {
        self.append_only_backend(store_name)
    }

    fn authenticated(&self, store_name: &str) -> AuthenticatedPersistence {
        self.authenticated_backend(store_name)
    }

    fn persisted_store_names(&self, family: DataFamily) -> Vec<String> {
        let mut names: Vec<String> = match family {
            DataFamily::AppendOnly => self
                .append_only
                .lock()
                .iter()
                .filter(|(_, store)| store.current().is_some())
                .map(|(name, _)| name.clone())
                .collect(),
            DataFamily::Authenticated => self
                .authenticated
                .lock()
                .iter()
                .filter(|(_, store)| store.current().is_some())
                .map(|(name, _)| name.clone())
                .collect(),
        };
        names.sort();
        names
    }
}
