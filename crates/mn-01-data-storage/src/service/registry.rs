//! # Storage Service Registry
//!
//! Owns one store per catalog entry. Stores are created on first use and
//! loaded from persistence before they accept requests. Requests whose
//! metadata does not match the catalog are rejected before any store is
//! touched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_bus::{EventFilter, InMemoryEventBus, Subscription};
use shared_types::TimeSource;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::append_only::AppendOnlyDataStorageService;
use super::authenticated::AuthenticatedDataStorageService;
use super::config::StorageConfig;
use super::metrics::{StorageMetrics, StorageMetricsSnapshot};
use super::DataStorageService;
use crate::authorization::{AuthorizationVerifier, BondedRoleRegistry};
use crate::domain::{
    AddAppendOnlyDataRequest, AddAuthenticatedDataRequest, DataFamily, DataRequest,
    DataStorageResult, DistributedDataExt, MetaData, RefreshAuthenticatedDataRequest,
    RemoveAuthenticatedDataRequest, StorageError, StorageEvent, StorageTopic,
};
use crate::ports::{DataStorageApi, StorePersistenceProvider};

/// Entry count of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReport {
    pub family: DataFamily,
    pub store_name: String,
    pub entries: usize,
}

/// Summary of all stores, answered to storage reporting requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageReport {
    pub stores: Vec<StoreReport>,
    pub total_entries: usize,
    /// Wire size of all stored requests.
    pub total_bytes: u64,
}

pub struct StorageService {
    config: StorageConfig,
    provider: Arc<dyn StorePersistenceProvider>,
    verifier: Arc<AuthorizationVerifier>,
    bonded_roles: Arc<BondedRoleRegistry>,
    clock: Arc<dyn TimeSource>,
    events: Arc<InMemoryEventBus<StorageEvent>>,
    metrics: Arc<StorageMetrics>,
    append_only: RwLock<HashMap<String, Arc<AppendOnlyDataStorageService>>>,
    authenticated: RwLock<HashMap<String, Arc<AuthenticatedDataStorageService>>>,
    // Serializes store creation so a store is loaded exactly once.
    creation: tokio::sync::Mutex<()>,
}

impl StorageService {
    pub fn new(
        config: StorageConfig,
        provider: Arc<dyn StorePersistenceProvider>,
        verifier: Arc<AuthorizationVerifier>,
        bonded_roles: Arc<BondedRoleRegistry>,
        clock: Arc<dyn TimeSource>,
        events: Arc<InMemoryEventBus<StorageEvent>>,
    ) -> Self {
        Self {
            config,
            provider,
            verifier,
            bonded_roles,
            clock,
            events,
            metrics: Arc::new(StorageMetrics::default()),
            append_only: RwLock::new(HashMap::new()),
            authenticated: RwLock::new(HashMap::new()),
            creation: tokio::sync::Mutex::new(()),
        }
    }

    pub fn subscribe(&self, topics: Vec<StorageTopic>) -> Subscription<StorageEvent> {
        self.events.subscribe(EventFilter::topics(topics))
    }

    pub fn metrics(&self) -> StorageMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn bonded_roles(&self) -> &Arc<BondedRoleRegistry> {
        &self.bonded_roles
    }

    // =========================================================================
    // STARTUP
    // =========================================================================

    /// Load every persisted catalog store and drop authorized data that does
    /// not pass authorization against the restored bonded roles.
    pub async fn initialize(&self) -> Result<usize, StorageError> {
        for name in self.persisted_catalog_stores(DataFamily::AppendOnly) {
            self.append_only_store(&name).await?;
        }
        for name in self.persisted_catalog_stores(DataFamily::Authenticated) {
            self.authenticated_store(&name).await?;
        }

        // Registrations authorize each other, prune until nothing changes.
        loop {
            let stores = self.authenticated_stores();
            let authorized: Vec<_> = stores.iter().flat_map(|s| s.authorized_data()).collect();
            self.bonded_roles.rebuild(authorized.iter());
            let pruned: usize = stores.iter().map(|s| s.prune_invalid_authorized()).sum();
            if pruned == 0 {
                break;
            }
        }

        let report = self.storage_report();
        info!(
            stores = report.stores.len(),
            entries = report.total_entries,
            "Data storage initialized"
        );
        Ok(report.total_entries)
    }

    fn persisted_catalog_stores(&self, family: DataFamily) -> Vec<String> {
        let (known, unknown): (Vec<_>, Vec<_>) = self
            .provider
            .persisted_store_names(family)
            .into_iter()
            .partition(|name| self.config.catalog.meta_data(family, name).is_some());
        for name in unknown {
            warn!(store = %name, family = family.as_str(), "Skipping persisted store outside the catalog");
        }
        known
    }

    fn pinned(&self, family: DataFamily, store_name: &str) -> Result<MetaData, StorageError> {
        self.config
            .catalog
            .meta_data(family, store_name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownStore {
                family,
                store: store_name.to_string(),
            })
    }

    /// Store named in the catalog, `UnknownStore` for any other name.
    pub async fn append_only_store(
        &self,
        store_name: &str,
    ) -> Result<Arc<AppendOnlyDataStorageService>, StorageError> {
        if let Some(store) = self.append_only.read().get(store_name) {
            return Ok(store.clone());
        }
        let meta_data = self.pinned(DataFamily::AppendOnly, store_name)?;
        let _creating = self.creation.lock().await;
        if let Some(store) = self.append_only.read().get(store_name) {
            return Ok(store.clone());
        }
        let store = Arc::new(AppendOnlyDataStorageService::new(
            meta_data,
            self.provider.append_only(store_name),
            self.config.persist_interval,
            self.events.clone(),
            self.metrics.clone(),
        ));
        let entries = store.load_persisted().await?;
        debug!(store = store_name, entries, "Append-only store opened");
        self.append_only
            .write()
            .insert(store_name.to_string(), store.clone());
        Ok(store)
    }

    pub async fn authenticated_store(
        &self,
        store_name: &str,
    ) -> Result<Arc<AuthenticatedDataStorageService>, StorageError> {
        if let Some(store) = self.authenticated.read().get(store_name) {
            return Ok(store.clone());
        }
        let meta_data = self.pinned(DataFamily::Authenticated, store_name)?;
        let _creating = self.creation.lock().await;
        if let Some(store) = self.authenticated.read().get(store_name) {
            return Ok(store.clone());
        }
        let store = Arc::new(AuthenticatedDataStorageService::new(
            meta_data,
            self.provider.authenticated(store_name),
            self.config.persist_interval,
            self.verifier.clone(),
            self.bonded_roles.clone(),
            self.clock.clone(),
            self.events.clone(),
            self.metrics.clone(),
        ));
        let entries = store.load_persisted().await?;
        debug!(store = store_name, entries, "Authenticated store opened");
        self.authenticated
            .write()
            .insert(store_name.to_string(), store.clone());
        Ok(store)
    }

    /// Catalog store name for a request claiming `meta_data`. Claims that do
    /// not match the catalog are counted as invalid data.
    fn route(&self, family: DataFamily, meta_data: &MetaData) -> Option<String> {
        match self.config.catalog.resolve(family, meta_data) {
            Some(pinned) => Some(pinned.store_name().to_string()),
            None => {
                self.metrics.record(DataStorageResult::DataInvalid);
                info!(
                    store = %meta_data.store_name().escape_debug(),
                    family = family.as_str(),
                    "Rejected request with metadata outside the catalog"
                );
                None
            }
        }
    }

    fn append_only_stores(&self) -> Vec<Arc<AppendOnlyDataStorageService>> {
        self.append_only.read().values().cloned().collect()
    }

    fn authenticated_stores(&self) -> Vec<Arc<AuthenticatedDataStorageService>> {
        self.authenticated.read().values().cloned().collect()
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Run expiry pruning on every authenticated store.
    pub fn prune_expired(&self) -> usize {
        self.authenticated_stores()
            .iter()
            .map(|store| store.prune_expired())
            .sum()
    }

    pub fn spawn_prune_task(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.config.prune_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let pruned = self.prune_expired();
                        if pruned > 0 {
                            debug!(pruned, "Expiry pruning round");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Expiry pruning task stopped");
        })
    }

    /// Flush every store. All stores are attempted, the first error is returned.
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for store in self.append_only_stores() {
            if let Err(e) = store.flush().await {
                warn!(store = %store.store_name(), error = %e, "Flushing store failed");
                first_error.get_or_insert(e);
            }
        }
        for store in self.authenticated_stores() {
            if let Err(e) = store.flush().await {
                warn!(store = %store.store_name(), error = %e, "Flushing store failed");
                first_error.get_or_insert(e);
            }
        }
        info!("Data storage flushed");
        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl DataStorageApi for StorageService {
    async fn add_append_only(
        &self,
        request: AddAppendOnlyDataRequest,
    ) -> Result<DataStorageResult, StorageError> {
        let Some(name) = self.route(DataFamily::AppendOnly, request.meta_data()) else {
            return Ok(DataStorageResult::DataInvalid);
        };
        let store = self.append_only_store(&name).await?;
        Ok(store.add(request))
    }

    async fn add_authenticated(
        &self,
        request: AddAuthenticatedDataRequest,
    ) -> Result<DataStorageResult, StorageError> {
        let Some(name) = self.route(DataFamily::Authenticated, request.data().meta_data()) else {
            return Ok(DataStorageResult::DataInvalid);
        };
        let store = self.authenticated_store(&name).await?;
        Ok(store.add(request))
    }

    async fn remove_authenticated(
        &self,
        request: RemoveAuthenticatedDataRequest,
    ) -> Result<DataStorageResult, StorageError> {
        let Some(name) = self.route(DataFamily::Authenticated, &request.meta_data) else {
            return Ok(DataStorageResult::DataInvalid);
        };
        let store = self.authenticated_store(&name).await?;
        Ok(store.remove(request))
    }

    async fn refresh_authenticated(
        &self,
        request: RefreshAuthenticatedDataRequest,
    ) -> Result<DataStorageResult, StorageError> {
        let Some(name) = self.route(DataFamily::Authenticated, &request.meta_data) else {
            return Ok(DataStorageResult::DataInvalid);
        };
        let store = self.authenticated_store(&name).await?;
        Ok(store.refresh(request))
    }

    async fn process(&self, request: DataRequest) -> Result<DataStorageResult, StorageError> {
        match request {
            DataRequest::AddAppendOnly(r) => self.add_append_only(r).await,
            DataRequest::AddAuthenticated(r) => self.add_authenticated(r).await,
            DataRequest::RemoveAuthenticated(r) => self.remove_authenticated(r).await,
            DataRequest::RefreshAuthenticated(r) => self.refresh_authenticated(r).await,
        }
    }

    fn all_entries(&self) -> Vec<DataRequest> {
        let mut entries: Vec<DataRequest> = self
            .append_only_stores()
            .iter()
            .flat_map(|store| store.entries())
            .collect();
        entries.extend(self.authenticated_stores().iter().flat_map(|store| store.entries()));
        entries
    }

    fn storage_report(&self) -> StorageReport {
        let mut report = StorageReport::default();
        let mut add = |family: DataFamily, store_name: &str, entries: Vec<DataRequest>| {
            report.total_entries += entries.len();
            report.total_bytes += entries.iter().map(|e| e.serialized_size() as u64).sum::<u64>();
            report.stores.push(StoreReport {
                family,
                store_name: store_name.to_string(),
                entries: entries.len(),
            });
        };
        for store in self.append_only_stores() {
            add(DataFamily::AppendOnly, store.store_name(), store.entries());
        }
        for store in self.authenticated_stores() {
            add(DataFamily::Authenticated, store.store_name(), store.entries());
        }
        report
            .stores
            .sort_by(|a, b| a.store_name.cmp(&b.store_name));
        report
    }
}
