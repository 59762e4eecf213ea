//! Mirrors service counters into the Prometheus registry.
//!
//! Services keep plain atomics. Gauges are set from current state on every
//! tick; counters advance by the delta since the previous tick.

use std::sync::Arc;
use std::time::Duration;

use mesh_telemetry::metrics::{
    INVENTORY_ROUNDS, NETWORK_LOAD, PEERS, PEER_EXCHANGE_ROUNDS, PENDING_RESENDS, STORE_ENTRIES,
};
use mesh_telemetry::{metric_set, service_span};
use mn_01_data_storage::DataStorageApi;
use mn_02_inventory::InventoryMetricsSnapshot;
use mn_03_peer_group::PeerGroupMetricsSnapshot;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::container::ServiceContainer;

#[derive(Default)]
struct Previous {
    inventory: InventoryMetricsSnapshot,
    peers: PeerGroupMetricsSnapshot,
}

pub struct MetricsMirror {
    services: Arc<ServiceContainer>,
    previous: Mutex<Previous>,
}

impl MetricsMirror {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self {
            services,
            previous: Mutex::new(Previous::default()),
        }
    }

    pub fn spawn(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let span = service_span!("metrics");
        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => self.tick(),
                        _ = shutdown.changed() => break,
                    }
                }
                debug!("Metrics mirror stopped");
            }
            .instrument(span),
        )
    }

    pub fn tick(&self) {
        let services = &self.services;

        for store in services.storage.storage_report().stores {
            metric_set!(
                STORE_ENTRIES,
                &[store.family.as_str(), store.store_name.as_str()],
                store.entries
            );
        }

        let group = services.peer_group.peer_group();
        let transport = group.transport_type().as_str();
        metric_set!(PEERS, &[transport, "reported"], group.reported_peers().len());
        metric_set!(PEERS, &[transport, "persisted"], group.persisted_peers().len());
        metric_set!(PEERS, &[transport, "connected"], group.connected_peers().len());

        metric_set!(PENDING_RESENDS, services.resend.len());
        metric_set!(NETWORK_LOAD, services.network_load.snapshot().current().load);

        let inventory = services.inventory.metrics();
        let peers = services.peer_metrics.snapshot();
        let mut previous = self.previous.lock();

        let failed = inventory.requests_failed - previous.inventory.requests_failed;
        let sent = inventory.requests_sent - previous.inventory.requests_sent;
        INVENTORY_ROUNDS
            .with_label_values(&["complete"])
            .inc_by(sent.saturating_sub(failed) as f64);
        INVENTORY_ROUNDS.with_label_values(&["failed"]).inc_by(failed as f64);

        PEER_EXCHANGE_ROUNDS
            .with_label_values(&[transport, "succeeded"])
            .inc_by((peers.exchanges_succeeded - previous.peers.exchanges_succeeded) as f64);
        PEER_EXCHANGE_ROUNDS
            .with_label_values(&[transport, "failed"])
            .inc_by((peers.exchanges_failed - previous.peers.exchanges_failed) as f64);

        previous.inventory = inventory;
        previous.peers = peers;
    }
}
