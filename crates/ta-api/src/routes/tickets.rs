//! Ticket listing and recommendation endpoints.
//!
//! Tickets are the incident reports themselves, viewed through the triage
//! workflow: listed most recent first, each one can receive a generated
//! remediation recommendation.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use ta_core::TicketRecommendation;

use crate::dto::{IncidentDto, RecommendationResponse, TicketsQuery, TicketsResponse};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 10;

/// Creates ticket routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tickets))
        .route("/:ticket_id/recommend", post(recommend_ticket))
}

/// Lists recent tickets with a next-page hint.
#[utoipa::path(
    get,
    path = "/api/tickets",
    params(
        ("limit" = Option<usize>, Query, description = "Page size"),
        ("offset" = Option<usize>, Query, description = "Items to skip")
    ),
    responses(
        (status = 200, description = "Recent tickets", body = TicketsResponse)
    ),
    tag = "Tickets"
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketsQuery>,
) -> Result<Json<TicketsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    // Fetch one extra row to detect a further page.
    let incidents = state.index.list_all().await?;
    let page: Vec<IncidentDto> = incidents
        .into_iter()
        .skip(offset)
        .take(limit + 1)
        .map(IncidentDto::from)
        .collect();

    let has_more = page.len() > limit;
    let tickets = page.into_iter().take(limit).collect();
    Ok(Json(TicketsResponse { tickets, has_more }))
}

/// Generates a recommendation for one ticket.
#[utoipa::path(
    post,
    path = "/api/tickets/{ticket_id}/recommend",
    params(
        ("ticket_id" = String, Path, description = "Ticket (incident) id")
    ),
    responses(
        (status = 200, description = "Generated recommendation", body = RecommendationResponse),
        (status = 404, description = "Ticket not found"),
        (status = 502, description = "Engine failure")
    ),
    tag = "Tickets"
)]
pub async fn recommend_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let incident = state
        .index
        .get(&ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", ticket_id)))?;

    let output = state.recommender.recommend(&incident.content).await?;
    let recommendation =
        TicketRecommendation::new(incident.id, output.text, Some(output.usage));

    info!(
        ticket_id = %recommendation.ticket_id,
        recommendation_id = %recommendation.id,
        "Generated ticket recommendation"
    );
    Ok(Json(RecommendationResponse::from(recommendation)))
}
