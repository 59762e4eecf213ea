//! # Data Storage Service
//!
//! One content-addressed store per data type, in two families:
//!
//! - [`AppendOnlyDataStorageService`]: immutable data, never pruned
//! - [`AuthenticatedDataStorageService`]: owner-signed data with sequence
//!   numbers, removal markers and TTL expiry
//!
//! [`StorageService`] owns all stores and routes requests to them.
//!
//! ## Add Flow
//!
//! 1. Hash the payload, take the store lock
//! 2. Check capacity and duplicates (plus the authenticated checks)
//! 3. Insert, release the lock
//! 4. Request a rate-limited persist, publish a [`StorageEvent`]

mod append_only;
mod authenticated;
mod config;
mod metrics;
mod registry;
mod store_core;

pub use append_only::AppendOnlyDataStorageService;
pub use authenticated::AuthenticatedDataStorageService;
pub use config::StorageConfig;
pub use metrics::{StorageMetrics, StorageMetricsSnapshot};
pub use registry::{StorageReport, StorageService, StoreReport};
pub use store_core::StoreCore;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{DataRequest, DataStore, StorageError};

/// Behaviour common to every store.
#[async_trait]
pub trait DataStorageService: Send + Sync {
    type Request: Clone + Send + Sync + 'static;

    fn core(&self) -> &StoreCore<Self::Request>;

    /// Applied to a loaded snapshot before it replaces the in-memory map.
    fn prune_persisted(&self, store: DataStore<Self::Request>) -> DataStore<Self::Request> {
        store
    }

    /// Every stored request, as it would travel on the wire.
    fn entries(&self) -> Vec<DataRequest>;

    fn store_name(&self) -> &str {
        self.core().name()
    }

    fn len(&self) -> usize {
        self.core().len()
    }

    /// Load, prune and apply the persisted snapshot. Returns the entry count.
    async fn load_persisted(&self) -> Result<usize, StorageError> {
        if let Some(loaded) = self.core().load().await? {
            let before = loaded.len();
            let pruned = self.prune_persisted(loaded);
            let after = pruned.len();
            self.core().apply_persisted(pruned);
            if after < before {
                info!(store = %self.store_name(), before, after, "Pruned persisted store");
                self.core().request_persist();
            }
        }
        Ok(self.len())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.core().flush().await
    }
}
