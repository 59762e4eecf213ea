//! Store for owner-signed data.
//!
//! Entries are either an add request or a removal marker. The marker keeps
//! the latest removed sequence number so a delayed add cannot resurrect data
//! its owner already removed.

use std::sync::Arc;

use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_types::{DataHash, TimeSource};
use tracing::{debug, info};

use super::metrics::StorageMetrics;
use super::store_core::StoreCore;
use super::DataStorageService;
use crate::authorization::{AuthorizationVerifier, BondedRoleRegistry, Verdict};
use crate::domain::{
    key_hash, AddAuthenticatedDataRequest, AuthenticatedDataRequest, DataFamily, DataRequest,
    DataStorageResult, DataStore, DistributedData, DistributedDataExt, MetaData,
    RefreshAuthenticatedDataRequest, RemoveAuthenticatedDataRequest, StorageEvent,
};
use crate::ports::AuthenticatedPersistence;

pub struct AuthenticatedDataStorageService {
    core: StoreCore<AuthenticatedDataRequest>,
    meta_data: MetaData,
    verifier: Arc<AuthorizationVerifier>,
    bonded_roles: Arc<BondedRoleRegistry>,
    clock: Arc<dyn TimeSource>,
    events: Arc<InMemoryEventBus<StorageEvent>>,
    metrics: Arc<StorageMetrics>,
}

impl AuthenticatedDataStorageService {
    pub fn new(
        meta_data: MetaData,
        persistence: AuthenticatedPersistence,
        persist_interval: std::time::Duration,
        verifier: Arc<AuthorizationVerifier>,
        bonded_roles: Arc<BondedRoleRegistry>,
        clock: Arc<dyn TimeSource>,
        events: Arc<InMemoryEventBus<StorageEvent>>,
        metrics: Arc<StorageMetrics>,
    ) -> Self {
        Self {
            core: StoreCore::new(
                meta_data.store_name(),
                DataFamily::Authenticated,
                persistence,
                persist_interval,
            ),
            meta_data,
            verifier,
            bonded_roles,
            clock,
            events,
            metrics,
        }
    }

    // =========================================================================
    // ADD
    // =========================================================================

    pub fn add(&self, request: AddAuthenticatedDataRequest) -> DataStorageResult {
        let hash = request.hash();
        let now = self.clock.now_millis();
        let result = {
            let mut store = self.core.lock();
            let result = self.check_add(&store, &hash, &request, now);
            if result.is_success() {
                store.put(hash.clone(), AuthenticatedDataRequest::Add(request.clone()));
            }
            result
        };
        self.metrics.record(result);

        if result.is_success() {
            self.core.request_persist();
            debug!(store = %self.core.name(), hash = %hash, seq = request.sequence_number(), "Authenticated data added");
            self.publish(StorageEvent::Added {
                data: request.data().clone(),
                request: DataRequest::AddAuthenticated(request),
            });
        } else {
            self.log_rejection("add", &hash, result);
        }
        result
    }

    fn check_add(
        &self,
        store: &DataStore<AuthenticatedDataRequest>,
        hash: &DataHash,
        request: &AddAuthenticatedDataRequest,
        now: u64,
    ) -> DataStorageResult {
        if store.len() >= self.meta_data.max_map_size() {
            return DataStorageResult::MaxMapSizeReached;
        }
        if let Some(existing) = store.get(hash) {
            if matches!(existing, AuthenticatedDataRequest::Add(stored) if stored == request) {
                return DataStorageResult::RequestAlreadyReceived;
            }
            if request.sequence_number() <= existing.sequence_number() {
                return DataStorageResult::SequenceNrInvalid;
            }
        }
        if request.is_expired(now) {
            return DataStorageResult::Expired;
        }
        if request.data().family() != DataFamily::Authenticated {
            return DataStorageResult::DataInvalid;
        }
        match self
            .verifier
            .check(request.data(), &request.sequential_data.pub_key_hash)
        {
            Verdict::Valid => {}
            Verdict::DataInvalid => return DataStorageResult::DataInvalid,
            Verdict::NotAuthorized => return DataStorageResult::NotAuthorized,
        }
        if request.is_public_key_invalid() {
            return DataStorageResult::PublicKeyHashInvalid;
        }
        if request.is_signature_invalid() {
            return DataStorageResult::SignatureInvalid;
        }
        DataStorageResult::Accepted
    }

    // =========================================================================
    // REMOVE
    // =========================================================================

    pub fn remove(&self, request: RemoveAuthenticatedDataRequest) -> DataStorageResult {
        let hash = request.hash.clone();
        let mut changed = false;
        let (result, removed) = {
            let mut store = self.core.lock();
            match store.get(&hash).cloned() {
                None => {
                    if request.is_signature_invalid() {
                        (DataStorageResult::SignatureInvalid, None)
                    } else {
                        // Remember the removal for an add that may still arrive.
                        if store.len() < self.meta_data.max_map_size() {
                            store.put(hash.clone(), AuthenticatedDataRequest::Remove(request.clone()));
                            changed = true;
                        }
                        (DataStorageResult::NoEntry, None)
                    }
                }
                Some(AuthenticatedDataRequest::Remove(marker)) => {
                    if !request.is_sequence_nr_invalid(marker.sequence_number)
                        && key_hash(&request.owner_public_key) == key_hash(&marker.owner_public_key)
                        && !request.is_signature_invalid()
                    {
                        store.put(hash.clone(), AuthenticatedDataRequest::Remove(request.clone()));
                        changed = true;
                    }
                    (DataStorageResult::AlreadyRemoved, None)
                }
                Some(AuthenticatedDataRequest::Add(stored)) => {
                    if request.is_sequence_nr_invalid(stored.sequence_number()) {
                        (DataStorageResult::SequenceNrInvalid, None)
                    } else if request.is_public_key_hash_invalid(&stored.sequential_data) {
                        (DataStorageResult::PublicKeyHashInvalid, None)
                    } else if request.is_signature_invalid() {
                        (DataStorageResult::SignatureInvalid, None)
                    } else {
                        store.put(hash.clone(), AuthenticatedDataRequest::Remove(request.clone()));
                        changed = true;
                        (DataStorageResult::Accepted, Some(stored.data().clone()))
                    }
                }
            }
        };
        self.metrics.record(result);

        if changed {
            self.core.request_persist();
        }
        match removed {
            Some(data) => {
                self.metrics.record_removed();
                debug!(store = %self.core.name(), hash = %hash, "Authenticated data removed");
                self.publish(StorageEvent::Removed {
                    data,
                    request: Some(DataRequest::RemoveAuthenticated(request)),
                });
            }
            None => self.log_rejection("remove", &hash, result),
        }
        result
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    pub fn refresh(&self, request: RefreshAuthenticatedDataRequest) -> DataStorageResult {
        let hash = request.hash.clone();
        let now = self.clock.now_millis();
        let (result, refreshed) = {
            let mut store = self.core.lock();
            match store.get(&hash).cloned() {
                None => (DataStorageResult::NoEntry, None),
                Some(AuthenticatedDataRequest::Remove(_)) => (DataStorageResult::AlreadyRemoved, None),
                Some(AuthenticatedDataRequest::Add(stored)) => {
                    if request.is_sequence_nr_invalid(stored.sequence_number()) {
                        (DataStorageResult::SequenceNrInvalid, None)
                    } else if request.is_public_key_invalid(&stored.sequential_data) {
                        (DataStorageResult::PublicKeyHashInvalid, None)
                    } else if request.is_signature_invalid() {
                        (DataStorageResult::SignatureInvalid, None)
                    } else {
                        let updated = stored.refreshed(&request, now);
                        let data = updated.data().clone();
                        store.put(hash.clone(), AuthenticatedDataRequest::Add(updated));
                        (DataStorageResult::Accepted, Some(data))
                    }
                }
            }
        };
        self.metrics.record(result);

        match refreshed {
            Some(data) => {
                self.core.request_persist();
                self.metrics.record_refreshed();
                debug!(store = %self.core.name(), hash = %hash, seq = request.sequence_number, "Authenticated data refreshed");
                self.publish(StorageEvent::Refreshed {
                    data,
                    request: DataRequest::RefreshAuthenticated(request),
                });
            }
            None => self.log_rejection("refresh", &hash, result),
        }
        result
    }

    // =========================================================================
    // PRUNING
    // =========================================================================

    /// Drop expired entries. Listeners see a `Removed` event for every
    /// pruned add entry. Returns the number of entries dropped.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let expired = self.take_where(|entry| entry.is_expired(now));
        if !expired.is_empty() {
            info!(store = %self.core.name(), count = expired.len(), "Pruned expired data");
            self.metrics.record_expired(expired.len());
        }
        self.announce_removed(&expired);
        expired.len()
    }

    /// Drop authorized data that no longer passes authorization, e.g. after
    /// the signer lost its bonded role.
    pub fn prune_invalid_authorized(&self) -> usize {
        let invalid = self.take_where(|entry| match entry {
            AuthenticatedDataRequest::Add(add) => {
                add.data().as_authorized().is_some()
                    && self
                        .verifier
                        .is_data_invalid(add.data(), &add.sequential_data.pub_key_hash)
            }
            AuthenticatedDataRequest::Remove(_) => false,
        });
        if !invalid.is_empty() {
            info!(store = %self.core.name(), count = invalid.len(), "Pruned unauthorized data");
        }
        self.announce_removed(&invalid);
        invalid.len()
    }

    fn take_where(
        &self,
        mut pred: impl FnMut(&AuthenticatedDataRequest) -> bool,
    ) -> Vec<AuthenticatedDataRequest> {
        let mut taken = Vec::new();
        {
            let mut store = self.core.lock();
            store.retain(|_, entry| {
                if pred(entry) {
                    taken.push(entry.clone());
                    false
                } else {
                    true
                }
            });
        }
        if !taken.is_empty() {
            self.core.request_persist();
        }
        taken
    }

    fn announce_removed(&self, entries: &[AuthenticatedDataRequest]) {
        for entry in entries {
            if let AuthenticatedDataRequest::Add(add) = entry {
                self.publish(StorageEvent::Removed {
                    data: add.data().clone(),
                    request: None,
                });
            }
        }
    }

    /// Bonded roles are updated before listeners are notified.
    fn publish(&self, event: StorageEvent) {
        self.bonded_roles.apply(&event);
        self.events.publish(event);
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    /// Authorized data currently stored, used to seed deferred authorization.
    pub fn authorized_data(&self) -> Vec<DistributedData> {
        self.core
            .lock()
            .values()
            .filter_map(|entry| match entry {
                AuthenticatedDataRequest::Add(add) if add.data().as_authorized().is_some() => {
                    Some(add.data().clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, hash: &DataHash) -> Option<AuthenticatedDataRequest> {
        self.core.lock().get(hash).cloned()
    }

    fn log_rejection(&self, operation: &'static str, hash: &DataHash, result: DataStorageResult) {
        if result.is_adversarial() {
            info!(store = %self.core.name(), operation, hash = %hash, result = %result, "Rejected invalid request");
        } else {
            debug!(store = %self.core.name(), operation, hash = %hash, result = %result, "Request not applied");
        }
    }
}

impl DataStorageService for AuthenticatedDataStorageService {
    type Request = AuthenticatedDataRequest;

    fn core(&self) -> &StoreCore<AuthenticatedDataRequest> {
        &self.core
    }

    /// Drop expired entries, then keep the newest up to the store capacity.
    fn prune_persisted(
        &self,
        store: DataStore<AuthenticatedDataRequest>,
    ) -> DataStore<AuthenticatedDataRequest> {
        let now = self.clock.now_millis();
        let mut live: Vec<_> = store
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(hash, entry)| (hash.clone(), entry.clone()))
            .collect();
        let max_map_size = self.meta_data.max_map_size();
        if live.len() > max_map_size {
            live.sort_by(|(_, a), (_, b)| b.created().cmp(&a.created()));
            live.truncate(max_map_size);
        }
        live.into_iter().collect()
    }

    fn entries(&self) -> Vec<DataRequest> {
        self.core
            .lock()
            .values()
            .cloned()
            .map(DataRequest::from)
            .collect()
    }
}
