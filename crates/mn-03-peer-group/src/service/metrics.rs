//! Lock-free peer group counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PeerGroupMetrics {
    exchanges_succeeded: AtomicU64,
    exchanges_failed: AtomicU64,
    requests_served: AtomicU64,
    connections_closed: AtomicU64,
    peers_pruned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerGroupMetricsSnapshot {
    pub exchanges_succeeded: u64,
    pub exchanges_failed: u64,
    pub requests_served: u64,
    /// Closed by maintenance.
    pub connections_closed: u64,
    pub peers_pruned: u64,
}

impl PeerGroupMetrics {
    pub fn record_exchange(&self, success: bool) {
        let counter = if success {
            &self.exchanges_succeeded
        } else {
            &self.exchanges_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_closed(&self, count: usize) {
        self.connections_closed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_pruned(&self, count: usize) {
        self.peers_pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PeerGroupMetricsSnapshot {
        PeerGroupMetricsSnapshot {
            exchanges_succeeded: self.exchanges_succeeded.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            peers_pruned: self.peers_pruned.load(Ordering::Relaxed),
        }
    }
}
