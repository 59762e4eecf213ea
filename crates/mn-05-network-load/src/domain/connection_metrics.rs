//! Per-connection traffic counters over a sliding hour.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

const BUCKET_MS: u64 = 60 * 1000;
const WINDOW_BUCKETS: u64 = 60;

/// Traffic of one connection during the last hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub send_time_ms: u64,
    pub deserialize_time_ms: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

impl ConnectionMetrics {
    pub(crate) fn add(&mut self, other: &ConnectionMetrics) {
        self.sent_bytes += other.sent_bytes;
        self.received_bytes += other.received_bytes;
        self.send_time_ms += other.send_time_ms;
        self.deserialize_time_ms += other.deserialize_time_ms;
        self.messages_sent += other.messages_sent;
        self.messages_received += other.messages_received;
    }
}

/// Minute buckets covering the last hour.
#[derive(Debug, Default)]
pub struct ConnectionMetricsRecorder {
    buckets: VecDeque<(u64, ConnectionMetrics)>,
}

impl ConnectionMetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sent(&mut self, now: u64, bytes: u64, send_time_ms: u64) {
        let bucket = self.bucket(now);
        bucket.sent_bytes += bytes;
        bucket.send_time_ms += send_time_ms;
        bucket.messages_sent += 1;
    }

    pub fn on_received(&mut self, now: u64, bytes: u64, deserialize_time_ms: u64) {
        let bucket = self.bucket(now);
        bucket.received_bytes += bytes;
        bucket.deserialize_time_ms += deserialize_time_ms;
        bucket.messages_received += 1;
    }

    pub fn last_hour(&self, now: u64) -> ConnectionMetrics {
        let oldest = (now / BUCKET_MS).saturating_sub(WINDOW_BUCKETS - 1);
        let mut total = ConnectionMetrics::default();
        for (_, metrics) in self.buckets.iter().filter(|(minute, _)| *minute >= oldest) {
            total.add(metrics);
        }
        total
    }

    fn bucket(&mut self, now: u64) -> &mut ConnectionMetrics {
        let minute = now / BUCKET_MS;
        let oldest = minute.saturating_sub(WINDOW_BUCKETS - 1);
        while self.buckets.front().is_some_and(|(m, _)| *m < oldest) {
            self.buckets.pop_front();
        }
        if self.buckets.back().map(|(m, _)| *m) != Some(minute) {
            self.buckets.push_back((minute, ConnectionMetrics::default()));
        }
        let last = self.buckets.len() - 1;
        &mut self.buckets[last].1
    }
}
