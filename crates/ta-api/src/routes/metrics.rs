//! Prometheus metrics endpoint.

use axum::{extract::State, routing::get, Router};

use crate::error::ApiError;
use crate::state::AppState;

/// Creates metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(prometheus_metrics))
}

/// Renders metrics in Prometheus exposition format.
async fn prometheus_metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    match &state.prometheus_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(ApiError::NotFound(
            "metrics exporter not configured".to_string(),
        )),
    }
}
