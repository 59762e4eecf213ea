//! # Ports Layer
//!
//! - `ConnectionMetricsSource` - last-hour traffic of every live connection

use crate::domain::ConnectionMetrics;

/// Implemented by the transports of the node runtime.
pub trait ConnectionMetricsSource: Send + Sync {
    fn connection_metrics(&self) -> Vec<ConnectionMetrics>;
}
