//! Prometheus HTTP endpoint for metrics scraping.
//!
//! Serves `GET /metrics` only. Any other path or method is a 404.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::TelemetryResult;

/// Scrape endpoint state.
#[derive(Clone)]
pub struct ScrapeState {
    registry: Arc<Registry>,
}

impl ScrapeState {
    /// Create scrape state serving the given registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Create the scrape HTTP router.
pub fn create_router(state: ScrapeState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler).fallback(not_found))
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Handle GET /metrics - render current instrument state.
async fn metrics_handler(State(state): State<ScrapeState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

/// Bind the scrape listener.
///
/// Split from [`serve`] so callers (and tests) can learn the bound address
/// when binding port 0.
pub async fn bind(addr: SocketAddr) -> TelemetryResult<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Scrape endpoint listening");
    Ok(listener)
}

/// Serve the scrape endpoint until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: ScrapeState,
    cancel: CancellationToken,
) -> TelemetryResult<()> {
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("Scrape endpoint shutting down");
        })
        .await?;

    Ok(())
}

/// Bind and serve the scrape endpoint.
///
/// # Arguments
///
/// * `addr` - Address to bind to
/// * `state` - Registry to serve
/// * `cancel` - Token stopping the server gracefully
pub async fn run_prometheus_server(
    addr: SocketAddr,
    state: ScrapeState,
    cancel: CancellationToken,
) -> TelemetryResult<()> {
    let listener = bind(addr).await?;
    serve(listener, state, cancel).await
}
