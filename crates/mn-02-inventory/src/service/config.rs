//! Inventory service configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Byte budget of one inventory response, in KB.
    pub max_size_in_kb: usize,
    pub request_timeout: Duration,
    /// Concurrent requests while the initial sync runs.
    pub max_pending_requests_at_startup: usize,
    /// Connections asked per periodic round.
    pub max_pending_requests_at_periodic: usize,
    /// Complete responses needed before switching to periodic requests.
    pub min_completed_requests: usize,
    pub repeat_request_interval: Duration,
    /// Delay after a failed or incomplete periodic round.
    pub retry_delay: Duration,
    /// Delay when no connection was available.
    pub idle_delay: Duration,
    /// Send a bloom summary instead of the exact entry list.
    pub use_bloom_filter: bool,
    pub bloom_false_positive_rate: f64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_size_in_kb: 2000,
            request_timeout: Duration::from_secs(90),
            max_pending_requests_at_startup: 5,
            max_pending_requests_at_periodic: 2,
            min_completed_requests: 2,
            repeat_request_interval: Duration::from_secs(600),
            retry_delay: Duration::from_secs(1),
            idle_delay: Duration::from_secs(60),
            use_bloom_filter: false,
            bloom_false_positive_rate: 0.01,
        }
    }
}

impl InventoryConfig {
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_in_kb.saturating_mul(1024)
    }

    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_millis(500),
            repeat_request_interval: Duration::from_secs(5),
            retry_delay: Duration::from_millis(50),
            idle_delay: Duration::from_millis(200),
            ..Self::default()
        }
    }
}
