//! # Mesh Telemetry
//!
//! Observability for Mesh-Net nodes.
//!
//! - Structured logs through `tracing-subscriber` (pretty or JSON)
//! - Optional span export over OTLP (`otlp` feature)
//! - Prometheus metrics in a process-wide registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mesh_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).await?;
//!     // Logs and metrics are collected until the guard is dropped.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `mesh-net` | Service name in logs and traces |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `http://localhost:4317` | OTLP endpoint |
//! | `MN_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `MN_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `MN_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `MN_NETWORK` | `mainnet` | Deployment label |
//! | `MN_METRICS_PORT` | `9100` | Prometheus scrape port, `0` disables |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{encode_metrics, register_metrics, HistogramTimer, MetricsHandle};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the global subscriber and register metrics.
///
/// Hold the returned guard for the lifetime of the process; dropping it
/// flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}

/// Span carrying the service name, e.g. `service_span!("inventory", connection = %id)`.
#[macro_export]
macro_rules! service_span {
    ($service:expr $(, $($field:tt)*)?) => {
        tracing::info_span!("service", service = $service $(, $($field)*)?)
    };
}

#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[macro_export]
macro_rules! metric_set {
    ($metric:expr, $value:expr) => {
        $metric.set($value as f64)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).set($value as f64)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "mesh-net");
    }

    #[test]
    fn test_metric_macros() {
        metric_inc!(metrics::INVENTORY_ROUNDS, &["complete"]);
        metric_set!(metrics::PENDING_RESENDS, 3usize);
        assert_eq!(metrics::PENDING_RESENDS.get(), 3.0);
    }
}
