//! HTTP exposition of [`ReloadMetrics`].

use super::ReloadMetrics;
use crate::error::{ReloadError, Result};
use crate::shutdown::Shutdown;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves the Prometheus text format on a telemetry path, plus a small
/// landing page on `/`.
///
/// # Examples
///
/// ```rust,no_run
/// use configmap_reload::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<()> {
/// let metrics = Arc::new(ReloadMetrics::new()?);
/// let server = MetricsServer::bind("0.0.0.0:9533", "/metrics", metrics).await?;
/// tokio::spawn(server.run(Shutdown::never()));
/// # Ok(())
/// # }
/// ```
pub struct MetricsServer {
    listener: TcpListener,
    router: Router,
}

impl MetricsServer {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError::Metrics`] if the telemetry path is not an
    /// absolute path other than `/`, or the address cannot be bound.
    pub async fn bind(
        addr: &str,
        telemetry_path: &str,
        metrics: Arc<ReloadMetrics>,
    ) -> Result<Self> {
        if !telemetry_path.starts_with('/') || telemetry_path == "/" {
            return Err(ReloadError::Metrics(format!(
                "Invalid telemetry path {:?}",
                telemetry_path
            )));
        }

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            ReloadError::Metrics(format!("Failed to listen on {}: {}", addr, e))
        })?;

        Ok(Self {
            listener,
            router: router(telemetry_path, metrics),
        })
    }

    /// Address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ReloadError::Metrics(e.to_string()))
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, mut shutdown: Shutdown) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(address = %addr, "Serving metrics");
        }

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| ReloadError::Metrics(format!("Metrics server failed: {}", e)))
    }
}

fn router(telemetry_path: &str, metrics: Arc<ReloadMetrics>) -> Router {
    let index = Html(format!(
        "<html>\n<head><title>ConfigMap Reload Metrics</title></head>\n<body>\n\
         <h1>ConfigMap Reload</h1>\n<p><a href='{}'>Metrics</a></p>\n</body>\n</html>\n",
        telemetry_path
    ));

    Router::new()
        .route("/", get(move || async move { index }))
        .route(telemetry_path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<ReloadMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
