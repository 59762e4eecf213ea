//! Per-type storage parameters.

use serde::{Deserialize, Serialize};

/// Milliseconds in a day, the usual unit for TTLs.
pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

pub const DEFAULT_MAX_MAP_SIZE: usize = 10_000;
pub const MIN_COST_FACTOR: f64 = 0.5;
pub const MAX_COST_FACTOR: f64 = 1.0;

/// Immutable storage parameters of a data type.
///
/// `ttl_ms` is ignored for append-only data, which never expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    ttl_ms: u64,
    priority: i32,
    store_name: String,
    max_map_size: usize,
    cost_factor: f64,
}

impl MetaData {
    pub fn new(store_name: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            ttl_ms,
            priority: 0,
            store_name: store_name.into(),
            max_map_size: DEFAULT_MAX_MAP_SIZE,
            cost_factor: MIN_COST_FACTOR,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_map_size(mut self, max_map_size: usize) -> Self {
        self.max_map_size = max_map_size;
        self
    }

    /// Clamped to `[MIN_COST_FACTOR, MAX_COST_FACTOR]`.
    pub fn with_cost_factor(mut self, cost_factor: f64) -> Self {
        self.cost_factor = clamp_cost_factor(cost_factor);
        self
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn max_map_size(&self) -> usize {
        self.max_map_size
    }

    /// Always within bounds, also for values decoded from the wire.
    pub fn cost_factor(&self) -> f64 {
        clamp_cost_factor(self.cost_factor)
    }
}

fn clamp_cost_factor(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_COST_FACTOR;
    }
    value.clamp(MIN_COST_FACTOR, MAX_COST_FACTOR)
}
