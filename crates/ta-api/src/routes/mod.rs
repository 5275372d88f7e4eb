//! API routes.

pub mod analyses;
pub mod categorize;
pub mod chat;
pub mod health;
pub mod incidents;
pub mod metrics;
pub mod tickets;

use axum::Router;

use crate::state::AppState;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
}

/// API routes under the /api prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/incidents", incidents::routes())
        .nest("/ai", Router::new().merge(categorize::routes()).merge(chat::routes()))
        .nest("/categorizations", categorize::saved_routes())
        .nest("/tickets", tickets::routes())
        .nest("/analyses", analyses::routes())
}
