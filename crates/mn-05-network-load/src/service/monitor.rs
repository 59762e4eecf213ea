//! # Network Load Monitor
//!
//! Samples all connections and the size of the data stores on a fixed
//! schedule and publishes the resulting load. Samples run on the blocking
//! pool. A slow sample delays the next tick, ticks never overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mn_01_data_storage::DataStorageApi;
use parking_lot::RwLock;
use shared_types::TimeSource;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::NetworkLoadConfig;
use super::snapshot::NetworkLoadSnapshot;
use crate::domain::{calculate_load, LoadInputs, NetworkLoad, DEFAULT_DIFFICULTY_ADJUSTMENT};
use crate::ports::ConnectionMetricsSource;

pub struct NetworkLoadMonitor {
    config: NetworkLoadConfig,
    sources: Vec<Arc<dyn ConnectionMetricsSource>>,
    storage: Arc<dyn DataStorageApi>,
    snapshot: Arc<NetworkLoadSnapshot>,
    clock: Arc<dyn TimeSource>,
    difficulty_adjustment_factor: RwLock<f64>,
    samples: AtomicU64,
    shutdown: watch::Receiver<bool>,
}

impl NetworkLoadMonitor {
    pub fn new(
        config: NetworkLoadConfig,
        sources: Vec<Arc<dyn ConnectionMetricsSource>>,
        storage: Arc<dyn DataStorageApi>,
        snapshot: Arc<NetworkLoadSnapshot>,
        clock: Arc<dyn TimeSource>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            sources,
            storage,
            snapshot,
            clock,
            difficulty_adjustment_factor: RwLock::new(DEFAULT_DIFFICULTY_ADJUSTMENT),
            samples: AtomicU64::new(0),
            shutdown,
        }
    }

    pub fn snapshot(&self) -> &Arc<NetworkLoadSnapshot> {
        &self.snapshot
    }

    pub fn set_difficulty_adjustment_factor(&self, factor: f64) {
        *self.difficulty_adjustment_factor.write() = factor;
    }

    pub fn num_samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Take one sample and publish it.
    pub fn update(&self) -> NetworkLoad {
        let connections: Vec<_> = self
            .sources
            .iter()
            .flat_map(|source| source.connection_metrics())
            .collect();
        let report = self.storage.storage_report();
        let inputs = LoadInputs::collect(&connections, report.total_bytes);
        let load = NetworkLoad::new(
            calculate_load(&inputs),
            *self.difficulty_adjustment_factor.read(),
        );

        info!(
            connections = inputs.num_connections,
            messages_sent = inputs.traffic.messages_sent,
            messages_received = inputs.traffic.messages_received,
            sent_bytes = inputs.traffic.sent_bytes,
            received_bytes = inputs.traffic.received_bytes,
            db_entries = report.total_entries,
            db_bytes = report.total_bytes,
            load = load.load,
            "Network load updated"
        );
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.snapshot.update(load, self.clock.now_millis());
        load
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }

    async fn run(self: Arc<Self>) {
        let start = Instant::now() + self.config.initial_delay;
        let mut ticker = tokio::time::interval_at(start, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let monitor = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || monitor.update()).await {
                        warn!(error = %e, "Network load sample failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Network load monitor stopped");
    }
}
