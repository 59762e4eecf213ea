//! Persistence backends, chosen once at startup.

use std::sync::Arc;

use mn_01_data_storage::{FileStoreProvider, InMemoryStoreProvider, StorePersistenceProvider};
use mn_03_peer_group::{PeerGroupPersistence, PeerStore};
use mn_04_resend::{ResendPersistence, ResendStore};
use shared_persistence::{FilePersistence, InMemoryPersistence, StoreLayout};
use shared_types::TransportType;

use crate::container::config::StorageSettings;

#[derive(Debug, Clone)]
pub enum PersistenceBackend {
    Files(StoreLayout),
    InMemory,
}

impl PersistenceBackend {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        if settings.in_memory {
            PersistenceBackend::InMemory
        } else {
            PersistenceBackend::Files(StoreLayout::new(&settings.data_dir))
        }
    }

    pub fn store_provider(&self) -> Arc<dyn StorePersistenceProvider> {
        match self {
            PersistenceBackend::Files(layout) => Arc::new(FileStoreProvider::new(layout.clone())),
            PersistenceBackend::InMemory => Arc::new(InMemoryStoreProvider::new()),
        }
    }

    pub fn peers(&self, transport: TransportType) -> PeerGroupPersistence {
        match self {
            PersistenceBackend::Files(layout) => {
                Arc::new(FilePersistence::<PeerStore>::new(layout.peers(transport)))
            }
            PersistenceBackend::InMemory => Arc::new(InMemoryPersistence::<PeerStore>::new(format!(
                "peers_{}",
                transport.as_str()
            ))),
        }
    }

    pub fn resend_messages(&self) -> ResendPersistence {
        match self {
            PersistenceBackend::Files(layout) => {
                Arc::new(FilePersistence::<ResendStore>::new(layout.resend_messages()))
            }
            PersistenceBackend::InMemory => {
                Arc::new(InMemoryPersistence::<ResendStore>::new("resend_messages"))
            }
        }
    }
}
