//! Domain layer: connection traffic windows and the load formula.

pub mod connection_metrics;
pub mod load;

pub use connection_metrics::{ConnectionMetrics, ConnectionMetricsRecorder};
pub use load::{calculate_load, LoadInputs, NetworkLoad, DEFAULT_DIFFICULTY_ADJUSTMENT};
