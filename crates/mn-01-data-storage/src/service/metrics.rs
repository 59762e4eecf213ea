//! Lock-free storage counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::DataStorageResult;

#[derive(Debug, Default)]
pub struct StorageMetrics {
    accepted: AtomicU64,
    redundant: AtomicU64,
    rejected: AtomicU64,
    removed: AtomicU64,
    refreshed: AtomicU64,
    expired_pruned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageMetricsSnapshot {
    pub accepted: u64,
    /// Duplicates, stale sequence numbers, full stores.
    pub redundant: u64,
    /// Invalid, unauthorized or badly signed data.
    pub rejected: u64,
    pub removed: u64,
    pub refreshed: u64,
    pub expired_pruned: u64,
}

impl StorageMetrics {
    pub fn record(&self, result: DataStorageResult) {
        let counter = if result.is_success() {
            &self.accepted
        } else if result.is_adversarial() {
            &self.rejected
        } else {
            &self.redundant
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refreshed(&self) {
        self.refreshed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired_pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StorageMetricsSnapshot {
        StorageMetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            redundant: self.redundant.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            expired_pruned: self.expired_pruned.load(Ordering::Relaxed),
        }
    }
}
