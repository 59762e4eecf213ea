//! Prometheus metrics for Mesh-Net services.
//!
//! Naming: `mn_<service>_<metric>_<unit>`. Services keep their own atomic
//! counters; the node runtime mirrors them into these gauges and counters.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // STORAGE
    // =========================================================================

    /// Entries per store, labelled by data family and store name
    pub static ref STORE_ENTRIES: GaugeVec = GaugeVec::new(
        Opts::new("mn_storage_entries", "Number of entries per data store"),
        &["family", "store"]
    ).expect("metric creation failed");

    /// Add outcomes (accepted, already_stored, max_map_size_reached, invalid, ...)
    pub static ref DATA_ADD_RESULTS: CounterVec = CounterVec::new(
        Opts::new("mn_storage_add_results_total", "Results of data add requests"),
        &["family", "result"]
    ).expect("metric creation failed");

    // =========================================================================
    // INVENTORY
    // =========================================================================

    /// Inventory rounds by outcome (complete, partial, timeout, failed)
    pub static ref INVENTORY_ROUNDS: CounterVec = CounterVec::new(
        Opts::new("mn_inventory_rounds_total", "Inventory request rounds"),
        &["outcome"]
    ).expect("metric creation failed");

    pub static ref INVENTORY_ROUND_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "mn_inventory_round_duration_seconds",
            "Time from inventory request to response"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // PEERS
    // =========================================================================

    /// Peer view sizes by transport and view (reported, persisted, connected)
    pub static ref PEERS: GaugeVec = GaugeVec::new(
        Opts::new("mn_peers", "Number of peers per view"),
        &["transport", "view"]
    ).expect("metric creation failed");

    pub static ref PEER_EXCHANGE_ROUNDS: CounterVec = CounterVec::new(
        Opts::new("mn_peer_exchange_rounds_total", "Peer exchange attempts"),
        &["transport", "outcome"]
    ).expect("metric creation failed");

    // =========================================================================
    // RESEND / LOAD
    // =========================================================================

    pub static ref PENDING_RESENDS: Gauge = Gauge::new(
        "mn_resend_pending_messages",
        "Confidential messages awaiting delivery confirmation"
    ).expect("metric creation failed");

    /// Latest network load estimate in [0, 1]
    pub static ref NETWORK_LOAD: Gauge = Gauge::new(
        "mn_network_load",
        "Estimated network load"
    ).expect("metric creation failed");

    // =========================================================================
    // WIRE
    // =========================================================================

    pub static ref MESSAGES_SENT: CounterVec = CounterVec::new(
        Opts::new("mn_messages_sent_total", "Wire messages sent"),
        &["message"]
    ).expect("metric creation failed");

    pub static ref MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("mn_messages_received_total", "Wire messages received"),
        &["message"]
    ).expect("metric creation failed");
}

/// Keeps the registry alive.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(STORE_ENTRIES.clone()),
        Box::new(DATA_ADD_RESULTS.clone()),
        Box::new(INVENTORY_ROUNDS.clone()),
        Box::new(INVENTORY_ROUND_DURATION.clone()),
        Box::new(PEERS.clone()),
        Box::new(PEER_EXCHANGE_ROUNDS.clone()),
        Box::new(PENDING_RESENDS.clone()),
        Box::new(NETWORK_LOAD.clone()),
        Box::new(MESSAGES_SENT.clone()),
        Box::new(MESSAGES_RECEIVED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Render all metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Observes the elapsed time into a histogram on drop.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        NETWORK_LOAD.set(0.25);
        let text = encode_metrics().unwrap();
        assert!(text.contains("mn_network_load"));
    }

    #[test]
    fn test_labelled_gauge() {
        STORE_ENTRIES
            .with_label_values(&["append_only", "Witness"])
            .set(42.0);
        assert_eq!(
            STORE_ENTRIES
                .with_label_values(&["append_only", "Witness"])
                .get(),
            42.0
        );
    }

    #[test]
    fn test_histogram_timer() {
        let before = INVENTORY_ROUND_DURATION.get_sample_count();
        drop(HistogramTimer::new(&INVENTORY_ROUND_DURATION));
        assert_eq!(INVENTORY_ROUND_DURATION.get_sample_count(), before + 1);
    }
}
