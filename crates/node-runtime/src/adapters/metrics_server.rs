//! # Metrics Endpoint
//!
//! Serves the process-wide Prometheus registry as text on `GET /metrics`.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use mesh_telemetry::encode_metrics;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub struct MetricsServer {
    listener: TcpListener,
}

impl MetricsServer {
    pub async fn bind(address: SocketAddr) -> std::io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(address).await?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let router = Router::new().route("/metrics", get(render_metrics));
        tokio::spawn(async move {
            if let Ok(local) = self.listener.local_addr() {
                info!(%local, "Serving Prometheus metrics");
            }
            let stopped = async move {
                let _ = shutdown.changed().await;
            };
            if let Err(e) = axum::serve(self.listener, router)
                .with_graceful_shutdown(stopped)
                .await
            {
                warn!(error = %e, "Metrics endpoint failed");
            }
            debug!("Metrics endpoint stopped");
        })
    }
}

async fn render_metrics() -> Response {
    // Gathering walks every collector under a lock.
    match tokio::task::spawn_blocking(encode_metrics).await {
        Ok(Ok(text)) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], text).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "Encoding metrics failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Metrics encoder task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
