use alertengine_engine::metrics::{encode_metrics, METRICS_CONTENT_TYPE};
use alertengine_engine::reloader::Reloader;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus_client::registry::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub reloader: Arc<Reloader>,
    pub registry: Arc<Registry>,
}

pub fn build_http_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(serve_metrics))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Ready once at least one manager is live; a fleet converged to zero
/// sources reports unavailable.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.reloader.manager_count().await > 0 {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

async fn serve_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        encode_metrics(&state.registry),
    )
}
