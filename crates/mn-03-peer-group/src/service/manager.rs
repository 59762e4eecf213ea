//! # Peer Group Manager
//!
//! Initializes the peer group of one transport and keeps it healthy:
//! closes unwanted connections, prunes outdated peers and extends the group
//! when it falls below its minimum.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shared_types::{ConnectionId, ConnectionInfo};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::MaintenanceConfig;
use super::exchange::PeerExchangeService;
use super::metrics::PeerGroupMetrics;
use super::peer_group::PeerGroupService;
use crate::domain::CloseReason;
use crate::ports::PeerTransport;

/// What one house keeping pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HouseKeepingReport {
    pub closed: Vec<(ConnectionId, CloseReason)>,
    pub pruned: usize,
    pub extended: bool,
}

pub struct PeerGroupManager {
    peer_group: Arc<PeerGroupService>,
    exchange: Arc<PeerExchangeService>,
    transport: Arc<dyn PeerTransport>,
    config: MaintenanceConfig,
    metrics: Arc<PeerGroupMetrics>,
    shutdown: watch::Receiver<bool>,
}

impl PeerGroupManager {
    pub fn new(
        peer_group: Arc<PeerGroupService>,
        exchange: Arc<PeerExchangeService>,
        transport: Arc<dyn PeerTransport>,
        config: MaintenanceConfig,
        metrics: Arc<PeerGroupMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            peer_group,
            exchange,
            transport,
            config,
            metrics,
            shutdown,
        }
    }

    pub fn peer_group(&self) -> &Arc<PeerGroupService> {
        &self.peer_group
    }

    pub fn exchange(&self) -> &Arc<PeerExchangeService> {
        &self.exchange
    }

    /// Restore persisted peers, run the initial exchange and start the
    /// house keeping task. Returns whether the initial exchange succeeded.
    pub async fn initialize(self: &Arc<Self>) -> (bool, JoinHandle<()>) {
        if let Err(e) = self.peer_group.load_persisted().await {
            warn!(error = %e, "Could not restore persisted peers, starting empty");
        }
        let success = self.exchange.start_initial_exchange().await;
        if !success {
            warn!(transport = %self.peer_group.transport_type(), "Initial peer exchange failed");
        }
        (success, self.spawn_house_keeping())
    }

    pub fn spawn_house_keeping(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.run_house_keeping().await })
    }

    async fn run_house_keeping(&self) {
        let period = self.config.house_keeping_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period / 4, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.house_keeping().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!(transport = %self.peer_group.transport_type(), "House keeping stopped");
    }

    /// One maintenance pass.
    pub async fn house_keeping(&self) -> HouseKeepingReport {
        let mut report = HouseKeepingReport::default();
        let mut open: Vec<ConnectionInfo> = self.transport.connections();

        let mut to_close = self.banned(&open);
        to_close.extend(self.duplicates(&open, &to_close));
        self.drain(&mut open, &to_close);

        let seeds = self.excess_seeds(&open);
        self.drain(&mut open, &seeds);
        to_close.extend(seeds);

        let inbound = self.excess_inbound(&open);
        self.drain(&mut open, &inbound);
        to_close.extend(inbound);

        let total = self.excess_total(&open);
        self.drain(&mut open, &total);
        to_close.extend(total);

        for (connection, reason) in &to_close {
            debug!(%connection, ?reason, "Closing connection");
            self.transport.close(connection, *reason).await;
        }
        self.metrics.record_closed(to_close.len());
        report.closed = to_close;

        report.pruned = self.peer_group.prune();
        self.metrics.record_pruned(report.pruned);

        let config = self.peer_group.config();
        let outbound = open.iter().filter(|c| c.is_outbound()).count();
        if open.len() < config.min_num_connected_peers
            || outbound < config.min_num_outbound_connected_peers
        {
            report.extended = self.exchange.extend_peer_group();
        }

        if !report.closed.is_empty() || report.pruned > 0 || report.extended {
            info!(
                transport = %self.peer_group.transport_type(),
                closed = report.closed.len(),
                pruned = report.pruned,
                extended = report.extended,
                connections = open.len(),
                "House keeping done"
            );
        }
        report
    }

    fn drain(&self, open: &mut Vec<ConnectionInfo>, closed: &[(ConnectionId, CloseReason)]) {
        let ids: HashSet<&ConnectionId> = closed.iter().map(|(id, _)| id).collect();
        open.retain(|c| !ids.contains(&c.id));
    }

    fn banned(&self, open: &[ConnectionInfo]) -> Vec<(ConnectionId, CloseReason)> {
        open.iter()
            .filter(|c| self.peer_group.is_banned(&c.peer_address))
            .map(|c| (c.id.clone(), CloseReason::Banned))
            .collect()
    }

    /// All but the oldest connection to the same address.
    fn duplicates(
        &self,
        open: &[ConnectionInfo],
        already: &[(ConnectionId, CloseReason)],
    ) -> Vec<(ConnectionId, CloseReason)> {
        let skip: HashSet<&ConnectionId> = already.iter().map(|(id, _)| id).collect();
        let mut oldest: HashMap<_, &ConnectionInfo> = HashMap::new();
        let mut out = Vec::new();
        for connection in open.iter().filter(|c| !skip.contains(&c.id)) {
            match oldest.get(&connection.peer_address).copied() {
                Some(kept) if kept.established_at <= connection.established_at => {
                    out.push((connection.id.clone(), CloseReason::DuplicateConnection));
                }
                Some(kept) => {
                    out.push((kept.id.clone(), CloseReason::DuplicateConnection));
                    oldest.insert(&connection.peer_address, connection);
                }
                None => {
                    oldest.insert(&connection.peer_address, connection);
                }
            }
        }
        out
    }

    fn excess_seeds(&self, open: &[ConnectionInfo]) -> Vec<(ConnectionId, CloseReason)> {
        let seeds: Vec<&ConnectionInfo> = open
            .iter()
            .filter(|c| self.peer_group.is_seed(&c.peer_address))
            .collect();
        newest_beyond(seeds, self.config.max_seeds, CloseReason::TooManyConnectionsToSeeds)
    }

    fn excess_inbound(&self, open: &[ConnectionInfo]) -> Vec<(ConnectionId, CloseReason)> {
        let inbound: Vec<&ConnectionInfo> = open
            .iter()
            .filter(|c| !c.is_outbound() && !self.peer_group.is_seed(&c.peer_address))
            .collect();
        let max = self.peer_group.config().max_inbound_connections();
        newest_beyond(inbound, max, CloseReason::TooManyInboundConnections)
    }

    /// Newest non-seed connections above the maximum.
    fn excess_total(&self, open: &[ConnectionInfo]) -> Vec<(ConnectionId, CloseReason)> {
        let max = self.peer_group.config().max_num_connected_peers;
        let excess = open.len().saturating_sub(max);
        if excess == 0 {
            return Vec::new();
        }
        let non_seeds: Vec<&ConnectionInfo> = open
            .iter()
            .filter(|c| !self.peer_group.is_seed(&c.peer_address))
            .collect();
        let keep = non_seeds.len().saturating_sub(excess);
        newest_beyond(non_seeds, keep, CloseReason::TooManyConnections)
    }

    /// Close every connection and flush the peer stores.
    pub async fn shutdown(&self) {
        for connection in self.transport.connections() {
            self.transport.close(&connection.id, CloseReason::Shutdown).await;
        }
        if let Err(e) = self.peer_group.flush().await {
            warn!(error = %e, "Flushing peers on shutdown failed");
        }
    }
}

/// Keep the `keep` oldest connections, close the rest.
fn newest_beyond(
    mut connections: Vec<&ConnectionInfo>,
    keep: usize,
    reason: CloseReason,
) -> Vec<(ConnectionId, CloseReason)> {
    if connections.len() <= keep {
        return Vec::new();
    }
    connections.sort_by_key(|c| c.established_at);
    connections
        .into_iter()
        .skip(keep)
        .map(|c| (c.id.clone(), reason))
        .collect()
}
