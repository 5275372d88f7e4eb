//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::dto::HealthResponse;
use crate::state::AppState;

/// Creates health routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Reports service and incident-store health.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let incident_store = state.index.health_check().await;
    let indexed_incidents = state.index.count().await.unwrap_or(0);

    Json(HealthResponse {
        status: if incident_store { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        incident_store,
        indexed_incidents,
    })
}
