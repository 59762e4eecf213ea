//! # Inventory Service
//!
//! Drives the requester side of reconciliation. New connections trigger
//! requests until the initial sync is complete, after which a periodic task
//! keeps asking a few connections at a time. Received entries are applied
//! to storage through [`DataStorageApi::process`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use mn_01_data_storage::DataStorageApi;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use shared_types::{ConnectionId, ConnectionInfo};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::InventoryConfig;
use super::metrics::{InventoryMetrics, InventoryMetricsSnapshot};
use super::requester::InventoryRequester;
use super::responder::{CompletionHook, InventoryResponder};
use crate::domain::{
    DataFilter, InventoryError, InventoryRequest, InventoryRequestPolicy, InventoryResponse, PolicyAction,
    RequestOutcome,
};
use crate::ports::InventoryTransport;

/// What one round trip brought in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedInventory {
    pub received: usize,
    /// Entries storage accepted as new.
    pub accepted: usize,
    /// Entries the peer withheld because of its size budget.
    pub num_dropped: usize,
}

impl AppliedInventory {
    fn outcome(&self) -> RequestOutcome {
        RequestOutcome::Delivered {
            entries: self.received,
            max_size_reached: self.num_dropped > 0,
        }
    }
}

fn outcome_of(result: &Result<AppliedInventory, InventoryError>) -> RequestOutcome {
    result
        .as_ref()
        .map_or(RequestOutcome::Failed, AppliedInventory::outcome)
}

pub struct InventoryService {
    config: InventoryConfig,
    storage: Arc<dyn DataStorageApi>,
    transport: Arc<dyn InventoryTransport>,
    requester: InventoryRequester,
    responder: InventoryResponder,
    policy: Mutex<InventoryRequestPolicy>,
    metrics: Arc<InventoryMetrics>,
    periodic_running: AtomicBool,
    shutdown: watch::Receiver<bool>,
}

impl InventoryService {
    pub fn new(
        config: InventoryConfig,
        storage: Arc<dyn DataStorageApi>,
        transport: Arc<dyn InventoryTransport>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let metrics = Arc::new(InventoryMetrics::default());
        let policy = InventoryRequestPolicy::new(
            config.min_completed_requests,
            config.max_pending_requests_at_startup,
            config.repeat_request_interval,
            config.retry_delay,
            config.idle_delay,
        );
        Self {
            requester: InventoryRequester::new(transport.clone(), config.request_timeout),
            responder: InventoryResponder::new(
                storage.clone(),
                transport.clone(),
                metrics.clone(),
                config.max_size_bytes(),
            ),
            policy: Mutex::new(policy),
            config,
            storage,
            transport,
            metrics,
            periodic_running: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn with_completion_hook(mut self, hook: CompletionHook) -> Self {
        self.responder = self.responder.with_completion_hook(hook);
        self
    }

    pub fn metrics(&self) -> InventoryMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn initial_requests_completed(&self) -> bool {
        self.policy.lock().initial_requests_completed()
    }

    pub fn num_pending_requests(&self) -> usize {
        self.requester.num_pending()
    }

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// Start an initial-sync request on a new connection if the policy allows.
    pub fn on_connection(self: &Arc<Self>, connection: &ConnectionInfo) -> Option<JoinHandle<()>> {
        let should_request = self.policy.lock().should_request_on_new_connection(
            &connection.peer_address,
            self.requester.has_pending(&connection.id),
            self.requester.num_pending(),
        );
        if !should_request {
            return None;
        }
        let service = self.clone();
        let connection = connection.clone();
        Some(tokio::spawn(service.run_initial(connection)))
    }

    pub fn on_connection_closed(&self, connection: &ConnectionId) {
        self.requester.on_connection_closed(connection);
        let remaining = self
            .transport
            .connections()
            .iter()
            .filter(|c| &c.id != connection)
            .count();
        if remaining == 0 {
            self.policy.lock().on_all_connections_lost();
        }
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    pub async fn on_request(
        &self,
        connection: &ConnectionId,
        request: InventoryRequest,
    ) -> Result<usize, InventoryError> {
        self.responder.handle_request(connection, request).await
    }

    pub fn on_response(&self, connection: &ConnectionId, response: InventoryResponse) -> bool {
        self.requester.on_response(connection, response)
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Filter describing everything stored locally.
    pub fn data_filter(&self) -> DataFilter {
        let entries = self.storage.all_entries();
        if self.config.use_bloom_filter {
            DataFilter::bloom(&entries, self.config.bloom_false_positive_rate, rand::random())
        } else {
            DataFilter::from_entries(entries.iter())
        }
    }

    /// One round trip on `connection`, applying what comes back.
    pub async fn request_inventory(
        &self,
        connection: &ConnectionId,
    ) -> Result<AppliedInventory, InventoryError> {
        self.metrics.record_request_sent();
        let inventory = match self.requester.request(connection, self.data_filter()).await {
            Ok(inventory) => inventory,
            Err(e) => {
                self.metrics.record_request_failed();
                debug!(%connection, error = %e, "Inventory request failed");
                return Err(e);
            }
        };

        let received = inventory.len();
        let num_dropped = inventory.num_dropped;
        let mut accepted = 0;
        for request in inventory.entries {
            match self.storage.process(request).await {
                Ok(result) if result.is_success() => accepted += 1,
                Ok(_) => {}
                Err(e) => warn!(%connection, error = %e, "Applying inventory entry failed"),
            }
        }
        self.metrics.record_received(received, accepted);
        info!(%connection, received, accepted, num_dropped, "Inventory applied");
        Ok(AppliedInventory {
            received,
            accepted,
            num_dropped,
        })
    }

    async fn run_initial(self: Arc<Self>, mut connection: ConnectionInfo) {
        loop {
            if *self.shutdown.borrow() {
                return;
            }
            let result = self.request_inventory(&connection.id).await;
            let outcome = outcome_of(&result);
            let action = self.policy.lock().on_request_completed(
                &connection.peer_address,
                outcome,
                self.requester.has_pending(&connection.id),
                self.requester.num_pending(),
            );
            debug!(connection = %connection.id, ?outcome, ?action, "Inventory request completed");

            match action {
                PolicyAction::RetrySameConnection => {
                    if !self.back_off().await {
                        return;
                    }
                }
                PolicyAction::RetryNewConnection => {
                    if outcome == RequestOutcome::Failed && !self.back_off().await {
                        return;
                    }
                    match self.fresh_candidate(&connection.id) {
                        Some(next) => connection = next,
                        None => {
                            debug!("No fresh connection for inventory request");
                            return;
                        }
                    }
                }
                PolicyAction::StartPeriodic => {
                    self.start_periodic();
                    return;
                }
                PolicyAction::DoNothing => return,
            }
        }
    }

    /// Wait `retry_delay` before the next request. False once shut down.
    async fn back_off(&self) -> bool {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.config.retry_delay) => !*shutdown.borrow(),
            _ = shutdown.changed() => false,
        }
    }

    fn usable_connections(&self) -> Vec<ConnectionInfo> {
        let policy = self.policy.lock();
        let mut connections: Vec<_> = self
            .transport
            .connections()
            .into_iter()
            .filter(|c| policy.can_use(&c.peer_address, self.requester.has_pending(&c.id)))
            .collect();
        connections.shuffle(&mut rand::thread_rng());
        connections
    }

    fn fresh_candidate(&self, excluded: &ConnectionId) -> Option<ConnectionInfo> {
        self.usable_connections()
            .into_iter()
            .find(|c| &c.id != excluded)
    }

    // =========================================================================
    // PERIODIC REQUESTS
    // =========================================================================

    fn start_periodic(self: &Arc<Self>) {
        if self
            .periodic_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        info!(
            interval_secs = self.config.repeat_request_interval.as_secs(),
            "Starting periodic inventory requests"
        );
        let service = self.clone();
        tokio::spawn(service.run_periodic());
    }

    async fn run_periodic(self: Arc<Self>) {
        let mut shutdown = self.shutdown.clone();
        let delay = self.config.repeat_request_interval;
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                self.periodic_running.store(false, Ordering::Release);
                return;
            }
        }
        loop {
            let mut candidates = self.usable_connections();
            candidates.truncate(self.config.max_pending_requests_at_periodic);
            let results = join_all(candidates.iter().map(|c| self.request_inventory(&c.id))).await;
            let outcomes: Vec<_> = results.iter().map(outcome_of).collect();
            let delay = self.policy.lock().periodic_delay(&outcomes);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        self.periodic_running.store(false, Ordering::Release);
        debug!("Periodic inventory requests stopped");
    }
}
