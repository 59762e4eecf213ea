//! # Mesh-Net Node
//!
//! Runs one node over clear-net TCP.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logs, metrics)
//! 2. Load configuration from `MN_CONFIG_FILE` and `MN_*` variables
//! 3. Lock the data directory unless running in memory
//! 4. Bind the listener, build and start the services
//! 5. Serve metrics on `MN_METRICS_PORT` unless it is 0
//! 6. Run until Ctrl+C, then shut down gracefully

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use mesh_telemetry::{init_telemetry, TelemetryConfig};
use shared_persistence::DirectoryLock;
use shared_types::SystemTimeSource;
use tracing::info;

use node_runtime::{load_config, MetricsServer, NodeRuntime, PersistenceBackend, TcpDialer, TcpServer};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let metrics_port = telemetry_config.metrics_port;
    let _telemetry = init_telemetry(telemetry_config)
        .await
        .context("initializing telemetry")?;

    let config = load_config().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let backend = PersistenceBackend::from_settings(&config.storage);
    let _lock = match &backend {
        PersistenceBackend::Files(layout) => Some(
            DirectoryLock::acquire(layout.db_dir()).context("locking the data directory")?,
        ),
        PersistenceBackend::InMemory => None,
    };

    let listen_address = config.listen_address()?;
    let max_frame_bytes = config.network.max_frame_bytes;
    let server = TcpServer::bind(&listen_address, max_frame_bytes)
        .await
        .with_context(|| format!("binding {listen_address}"))?;
    let dialer = Arc::new(TcpDialer::new(config.handshake_timeout(), max_frame_bytes));

    let runtime = NodeRuntime::new(config, dialer, &backend, Arc::new(SystemTimeSource))
        .context("building node services")?;
    let listener = server.spawn(runtime.network().clone(), runtime.shutdown_signal());
    runtime.start().await.context("starting node")?;

    let metrics = if metrics_port == 0 {
        None
    } else {
        let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, metrics_port));
        let server = MetricsServer::bind(address)
            .await
            .with_context(|| format!("binding metrics endpoint {address}"))?;
        Some(server.spawn(runtime.shutdown_signal()))
    };

    info!(address = %listen_address, "Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    let _ = listener.await;
    if let Some(metrics) = metrics {
        let _ = metrics.await;
    }
    Ok(())
}
