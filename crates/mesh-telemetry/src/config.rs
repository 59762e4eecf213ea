//! Telemetry configuration from environment variables.

use std::env;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for logs and traces
    pub service_name: String,

    /// OTLP endpoint, used with the `otlp` feature only
    pub otlp_endpoint: String,

    /// Log filter directive (trace, debug, info, warn, error or a full EnvFilter)
    pub log_level: String,

    pub console_output: bool,

    pub json_logs: bool,

    /// Deployment label (mainnet, regtest, ...)
    pub network: String,

    /// Port of the Prometheus scrape endpoint, 0 disables it
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "mesh-net".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            network: "mainnet".to_string(),
            metrics_port: 9100,
        }
    }
}

impl TelemetryConfig {
    /// Read the configuration from the environment, see the crate docs for
    /// the variables and defaults.
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let defaults = Self::default();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otlp_endpoint),

            log_level: env::var("MN_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: env::var("MN_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("MN_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            network: env::var("MN_NETWORK").unwrap_or(defaults.network),

            metrics_port: env::var("MN_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }

    /// Name with the network label appended unless it is mainnet.
    pub fn full_service_name(&self) -> String {
        if self.network == "mainnet" {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.network)
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
