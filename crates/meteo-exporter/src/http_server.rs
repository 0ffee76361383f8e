//! HTTP scrape endpoint for Prometheus.
//!
//! Serves the registry text on `/metrics` and `/`, plus a `/health`
//! liveness probe. Handlers only read the shared registry, so scrapes
//! return immediately and never wait on an in-flight poll cycle.

use crate::metrics::WeatherMetrics;
use axum::{
    extract::State,
    http::{header, StatusCode},
    routing::get,
    Router,
};
use std::sync::Arc;

/// Prometheus text exposition content type.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<WeatherMetrics>,
}

/// GET /metrics (and /) - Render the metrics registry
async fn serve_metrics(
    State(state): State<AppState>,
) -> Result<([(header::HeaderName, &'static str); 1], String), StatusCode> {
    match state.metrics.encode() {
        Ok(body) => Ok(([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body)),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Create the HTTP router
pub fn create_router(metrics: Arc<WeatherMetrics>) -> Router {
    let state = AppState { metrics };

    Router::new()
        .route("/", get(serve_metrics))
        .route("/metrics", get(serve_metrics))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_http_server(
    metrics: Arc<WeatherMetrics>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(metrics);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    log::info!("HTTP server listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
