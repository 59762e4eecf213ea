//! # Network Load Estimator
//!
//! Weighted sum of traffic and database size, each term normalized by a
//! reference maximum, bounded to `[0, 1]`.

use serde::{Deserialize, Serialize};

use super::connection_metrics::ConnectionMetrics;

const MB: f64 = 1024.0 * 1024.0;
const MINUTE_MS: f64 = 60_000.0;

const MAX_NUM_CONNECTIONS: f64 = 30.0;
const MAX_SENT_BYTES: f64 = 20.0 * MB;
const MAX_SEND_TIME_MS: f64 = MINUTE_MS;
const MAX_MESSAGES_SENT: f64 = 2000.0;
const MAX_RECEIVED_BYTES: f64 = 20.0 * MB;
const MAX_DESERIALIZE_TIME_MS: f64 = MINUTE_MS;
const MAX_MESSAGES_RECEIVED: f64 = 1000.0;
const MAX_DB_SIZE: f64 = 100.0 * MB;

const TRAFFIC_WEIGHT: f64 = 0.1;
const DB_WEIGHT: f64 = 0.3;

pub const DEFAULT_DIFFICULTY_ADJUSTMENT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkLoad {
    pub load: f64,
    pub difficulty_adjustment_factor: f64,
}

impl NetworkLoad {
    pub fn new(load: f64, difficulty_adjustment_factor: f64) -> Self {
        Self {
            load: load.clamp(0.0, 1.0),
            difficulty_adjustment_factor,
        }
    }
}

impl Default for NetworkLoad {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_DIFFICULTY_ADJUSTMENT)
    }
}

/// Inputs of one load calculation, summed over all connections.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadInputs {
    pub num_connections: usize,
    pub traffic: ConnectionMetrics,
    pub db_size_bytes: u64,
}

impl LoadInputs {
    pub fn collect(connections: &[ConnectionMetrics], db_size_bytes: u64) -> Self {
        let mut traffic = ConnectionMetrics::default();
        for metrics in connections {
            traffic.add(metrics);
        }
        Self {
            num_connections: connections.len(),
            traffic,
            db_size_bytes,
        }
    }
}

fn impact(value: u64, max: f64, weight: f64) -> f64 {
    value as f64 / max * weight
}

pub fn calculate_load(inputs: &LoadInputs) -> f64 {
    let t = &inputs.traffic;
    let load = impact(inputs.num_connections as u64, MAX_NUM_CONNECTIONS, TRAFFIC_WEIGHT)
        + impact(t.sent_bytes, MAX_SENT_BYTES, TRAFFIC_WEIGHT)
        + impact(t.send_time_ms, MAX_SEND_TIME_MS, TRAFFIC_WEIGHT)
        + impact(t.messages_sent, MAX_MESSAGES_SENT, TRAFFIC_WEIGHT)
        + impact(t.received_bytes, MAX_RECEIVED_BYTES, TRAFFIC_WEIGHT)
        + impact(t.deserialize_time_ms, MAX_DESERIALIZE_TIME_MS, TRAFFIC_WEIGHT)
        + impact(t.messages_received, MAX_MESSAGES_RECEIVED, TRAFFIC_WEIGHT)
        + impact(inputs.db_size_bytes, MAX_DB_SIZE, DB_WEIGHT);
    load.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_idle_node_has_zero_load() {
        assert!(approx(calculate_load(&LoadInputs::default()), 0.0));
    }

    #[test]
    fn test_each_term_reaches_its_weight_at_its_maximum() {
        let inputs = LoadInputs {
            num_connections: 30,
            ..LoadInputs::default()
        };
        assert!(approx(calculate_load(&inputs), 0.1));

        let inputs = LoadInputs {
            db_size_bytes: 100 * 1024 * 1024,
            ..LoadInputs::default()
        };
        assert!(approx(calculate_load(&inputs), 0.3));

        let inputs = LoadInputs::collect(
            &[ConnectionMetrics {
                messages_received: 500,
                ..ConnectionMetrics::default()
            }],
            0,
        );
        // One connection plus half the received message budget.
        assert!(approx(calculate_load(&inputs), 0.1 / 30.0 + 0.05));
    }

    #[test]
    fn test_load_is_bounded() {
        let inputs = LoadInputs {
            num_connections: 10_000,
            db_size_bytes: u64::MAX / 2,
            ..LoadInputs::default()
        };
        assert!(approx(calculate_load(&inputs), 1.0));
        assert!(approx(NetworkLoad::new(-3.0, 1.0).load, 0.0));
    }
}
