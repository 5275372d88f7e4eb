//! Batched categorization stream endpoint.
//!
//! The response is a Server-Sent-Events stream carrying the categorization
//! protocol: one `init`, one `batch` per processed batch, then a terminal
//! `complete` or `error`. Each event is one `data:` frame and is never split
//! across writes.

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use ta_core::db::StoredCategorization;
use ta_core::{BatchCategorizer, CategorizationResult, Incident, StreamEvent};

use crate::dto::CategorizationStreamRequest;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates categorization routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/categorization/stream", post(categorization_stream))
}

/// Creates the saved-categorization routes (under /api/categorizations).
pub fn saved_routes() -> Router<AppState> {
    Router::new().route("/", post(save_categorization).get(list_categorizations))
}

/// Streams the batched categorization of the posted incidents.
#[utoipa::path(
    post,
    path = "/api/ai/categorization/stream",
    request_body = CategorizationStreamRequest,
    responses(
        (status = 200, description = "SSE stream of categorization events", content_type = "text/event-stream"),
        (status = 422, description = "Unknown taxonomy selector")
    ),
    tag = "AI"
)]
pub async fn categorization_stream(
    State(state): State<AppState>,
    Json(request): Json<CategorizationStreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let incidents: Vec<Incident> = request.incidents.into_iter().map(Incident::from).collect();
    info!(
        taxonomy = %request.taxonomy,
        incidents = incidents.len(),
        "Opening categorization stream"
    );

    let producer = Arc::new(
        BatchCategorizer::new(Arc::clone(&state.classifier)).with_batch_size(state.batch_size),
    );
    let rx = producer.stream(incidents, request.taxonomy);

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse_event(&event)));
    Ok(Sse::new(stream))
}

/// Persists one aggregated categorization result.
async fn save_categorization(
    State(state): State<AppState>,
    Json(result): Json<CategorizationResult>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = state
        .categorizations
        .save(&StoredCategorization::new(result))
        .await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

/// Lists recently saved categorization results.
async fn list_categorizations(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<StoredCategorization>>, ApiError> {
    Ok(Json(
        state
            .categorizations
            .list_recent(query.limit.unwrap_or(10))
            .await?,
    ))
}

fn to_sse_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        // StreamEvent serialization cannot realistically fail; degrade to an
        // error frame rather than dropping the frame silently.
        Err(_) => Event::default()
            .data(r#"{"type":"error","message":"event serialization failed"}"#),
    }
}
