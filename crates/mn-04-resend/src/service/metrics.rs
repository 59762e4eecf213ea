//! Lock-free resend counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ResendMetrics {
    inserted: AtomicU64,
    removed: AtomicU64,
    resent: AtomicU64,
    resends_refused: AtomicU64,
    pruned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendMetricsSnapshot {
    pub inserted: u64,
    pub removed: u64,
    pub resent: u64,
    pub resends_refused: u64,
    pub pruned: u64,
}

impl ResendMetrics {
    pub fn record_inserted(&self) {
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resent(&self) {
        self.resent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refused(&self) {
        self.resends_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruned(&self, count: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResendMetricsSnapshot {
        ResendMetricsSnapshot {
            inserted: self.inserted.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            resent: self.resent.load(Ordering::Relaxed),
            resends_refused: self.resends_refused.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}
