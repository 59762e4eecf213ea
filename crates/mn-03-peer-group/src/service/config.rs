//! Peer group, exchange and maintenance configuration.

use std::time::Duration;

use crate::domain::{MAX_EXCHANGED_PEERS, MAX_PEER_AGE_MS};

#[derive(Debug, Clone)]
pub struct PeerGroupConfig {
    pub min_num_connected_peers: usize,
    pub min_num_outbound_connected_peers: usize,
    pub max_num_connected_peers: usize,
    pub min_num_reported_peers: usize,
    pub max_reported: usize,
    pub max_persisted: usize,
    /// Reported and persisted peers older than this are dropped.
    pub max_peer_age_ms: u64,
    pub persist_interval: Duration,
}

impl Default for PeerGroupConfig {
    fn default() -> Self {
        Self {
            min_num_connected_peers: 8,
            min_num_outbound_connected_peers: 3,
            max_num_connected_peers: 12,
            min_num_reported_peers: 1,
            max_reported: MAX_EXCHANGED_PEERS,
            max_persisted: MAX_EXCHANGED_PEERS,
            max_peer_age_ms: MAX_PEER_AGE_MS,
            persist_interval: Duration::from_secs(1),
        }
    }
}

impl PeerGroupConfig {
    /// Midpoint of the connection range.
    pub fn target_num_connected_peers(&self) -> usize {
        self.min_num_connected_peers
            + self
                .max_num_connected_peers
                .saturating_sub(self.min_num_connected_peers)
                / 2
    }

    pub fn max_inbound_connections(&self) -> usize {
        self.max_num_connected_peers
            .saturating_sub(self.min_num_outbound_connected_peers)
    }
}

#[derive(Debug, Clone)]
pub struct PeerExchangeConfig {
    pub num_seed_nodes_at_bootstrap: usize,
    pub num_persisted_peers_at_bootstrap: usize,
    pub num_reported_peers_at_bootstrap: usize,
    /// Share our peers with requesters.
    pub support_peer_reporting: bool,
    pub request_timeout: Duration,
    /// How long `start_initial_exchange` waits for the first success.
    pub bootstrap_timeout: Duration,
    pub max_retry_attempts: u32,
}

impl Default for PeerExchangeConfig {
    fn default() -> Self {
        Self {
            num_seed_nodes_at_bootstrap: 2,
            num_persisted_peers_at_bootstrap: 40,
            num_reported_peers_at_bootstrap: 40,
            support_peer_reporting: true,
            request_timeout: Duration::from_secs(90),
            bootstrap_timeout: Duration::from_secs(90),
            max_retry_attempts: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub house_keeping_interval: Duration,
    /// Connections to seeds kept once the group is formed.
    pub max_seeds: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            house_keeping_interval: Duration::from_secs(60),
            max_seeds: 2,
        }
    }
}

#[cfg(test)]
impl PeerExchangeConfig {
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_millis(500),
            bootstrap_timeout: Duration::from_secs(2),
            max_retry_attempts: 2,
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl PeerGroupConfig {
    pub fn for_testing() -> Self {
        Self {
            min_num_connected_peers: 2,
            min_num_outbound_connected_peers: 1,
            max_num_connected_peers: 4,
            persist_interval: Duration::from_millis(10),
            ..Self::default()
        }
    }
}
