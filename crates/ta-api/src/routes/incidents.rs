//! Incident ingestion and search endpoints.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use validator::Validate;

use ta_core::db::UploadRecord;
use ta_core::{Incident, ScoredIncident};

use crate::dto::{
    AddIncidentRequest, ImportRequest, ImportResponse, IncidentDto, ScoredIncidentDto,
    SearchQuery, SearchResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Minimum similarity for detailed search hits.
const SIMILARITY_FLOOR: f32 = 0.4;

const DEFAULT_TOP_K: usize = 5;

/// Creates incident routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(add_incident).delete(delete_all_incidents))
        .route("/import", post(import_incidents))
        .route("/search", get(search_incidents))
        .route("/uploads", get(list_uploads))
}

/// Adds a single incident from direct input.
#[utoipa::path(
    post,
    path = "/api/incidents",
    request_body = AddIncidentRequest,
    responses(
        (status = 200, description = "Incident indexed"),
        (status = 409, description = "Duplicate incident content"),
        (status = 422, description = "Invalid request body")
    ),
    tag = "Incidents"
)]
pub async fn add_incident(
    State(state): State<AppState>,
    Json(request): Json<AddIncidentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;

    let incident = Incident::new(
        request.content,
        request.source.unwrap_or_else(|| "direct-input".to_string()),
    );
    state.index.index_incident(&incident, true).await?;

    Ok(Json(json!({
        "message": "Incident added successfully",
        "incidentId": incident.id,
    })))
}

/// Imports separator-delimited incident text.
#[utoipa::path(
    post,
    path = "/api/incidents/import",
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Import finished", body = ImportResponse),
        (status = 400, description = "Invalid structure or no valid incidents")
    ),
    tag = "Incidents"
)]
pub async fn import_incidents(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    request.validate()?;

    let file_type = request.file_type.as_deref().unwrap_or("txt");
    let source = request.source.as_deref().unwrap_or("file-upload");
    let outcome = state
        .importer
        .import_file(&request.content, file_type, source)
        .await?;

    if outcome.processed == 0 {
        return Err(ApiError::BadRequest(
            "no valid incident found in the file".to_string(),
        ));
    }

    state
        .uploads
        .record(&UploadRecord::from_outcome(source, &outcome))
        .await?;

    Ok(Json(ImportResponse {
        message: "Import finished successfully".to_string(),
        details: format!(
            "Processed: {}, Duplicates: {}, Errors: {}",
            outcome.processed, outcome.duplicates, outcome.errors
        ),
        processed: outcome.processed,
        duplicates: outcome.duplicates,
        errors: outcome.errors,
        incident_ids: outcome.incident_ids,
    }))
}

/// Searches incidents.
///
/// Without `query`, returns the full corpus; the `simple` format returns a
/// bare incident array, `detailed` returns scored results above the
/// similarity floor.
#[utoipa::path(
    get,
    path = "/api/incidents/search",
    params(
        ("query" = Option<String>, Query, description = "Similarity query; omit for a full scan"),
        ("topK" = Option<usize>, Query, description = "Maximum similarity hits"),
        ("format" = Option<String>, Query, description = "simple | detailed")
    ),
    responses(
        (status = 200, description = "Matching incidents", body = SearchResponse)
    ),
    tag = "Incidents"
)]
pub async fn search_incidents(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let format = query.format.as_deref().unwrap_or("detailed");

    let Some(text) = query.query.as_deref().filter(|q| !q.trim().is_empty()) else {
        // Full scan; always the simple shape.
        let incidents = state.index.list_all().await?;
        let dtos: Vec<IncidentDto> = incidents.into_iter().map(IncidentDto::from).collect();
        return Ok(Json(dtos).into_response());
    };

    let top_k = query.top_k.unwrap_or(DEFAULT_TOP_K);
    let mut results: Vec<ScoredIncident> = state.index.search(text, top_k).await?;
    results.retain(|r| r.score >= SIMILARITY_FLOOR);

    if format == "simple" {
        let dtos: Vec<IncidentDto> = results
            .into_iter()
            .map(|r| IncidentDto::from(r.incident))
            .collect();
        return Ok(Json(dtos).into_response());
    }

    let results: Vec<ScoredIncidentDto> =
        results.into_iter().map(ScoredIncidentDto::from).collect();
    Ok(Json(SearchResponse { results }).into_response())
}

/// Drops every incident and clears the dedup cache.
pub async fn delete_all_incidents(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.index.clear().await?;
    Ok(Json(json!({
        "success": true,
        "message": "All records and the dedup cache were deleted",
    })))
}

/// Lists recent uploads.
async fn list_uploads(
    State(state): State<AppState>,
) -> Result<Json<Vec<UploadRecord>>, ApiError> {
    Ok(Json(state.uploads.list_recent(20).await?))
}
