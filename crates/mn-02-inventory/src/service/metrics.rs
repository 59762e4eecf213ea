//! Lock-free inventory counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct InventoryMetrics {
    requests_sent: AtomicU64,
    requests_failed: AtomicU64,
    entries_received: AtomicU64,
    entries_accepted: AtomicU64,
    requests_served: AtomicU64,
    entries_served: AtomicU64,
    invalid_filters: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryMetricsSnapshot {
    pub requests_sent: u64,
    /// Timeouts, cancellations and send failures.
    pub requests_failed: u64,
    pub entries_received: u64,
    /// Received entries that were new to storage.
    pub entries_accepted: u64,
    pub requests_served: u64,
    pub entries_served: u64,
    pub invalid_filters: u64,
}

impl InventoryMetrics {
    pub fn record_request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self, entries: usize, accepted: usize) {
        self.entries_received.fetch_add(entries as u64, Ordering::Relaxed);
        self.entries_accepted.fetch_add(accepted as u64, Ordering::Relaxed);
    }

    pub fn record_served(&self, entries: usize) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.entries_served.fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub fn record_invalid_filter(&self) {
        self.invalid_filters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> InventoryMetricsSnapshot {
        InventoryMetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            entries_received: self.entries_received.load(Ordering::Relaxed),
            entries_accepted: self.entries_accepted.load(Ordering::Relaxed),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            entries_served: self.entries_served.load(Ordering::Relaxed),
            invalid_filters: self.invalid_filters.load(Ordering::Relaxed),
        }
    }
}
