//! Saved analysis endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use ta_core::{IncidentEvaluation, SavedAnalysis};

use crate::dto::{EvaluationRequest, SaveAnalysisResponse};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Creates analysis routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_analyses).post(save_analysis))
        .route("/:analysis_id", get(get_analysis).delete(delete_analysis))
        .route(
            "/:analysis_id/evaluations/:incident_id",
            put(attach_evaluation).delete(detach_evaluation),
        )
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

/// Persists a completed analysis run.
async fn save_analysis(
    State(state): State<AppState>,
    Json(analysis): Json<SavedAnalysis>,
) -> Result<Json<SaveAnalysisResponse>, ApiError> {
    if analysis.user_email.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "an authenticated identity is required to save an analysis".to_string(),
        ));
    }
    if analysis.incidents.is_empty() {
        return Err(ApiError::BadRequest(
            "an analysis without incidents cannot be saved".to_string(),
        ));
    }

    let analysis_id = state.analyses.save(&analysis).await?;
    info!(analysis_id = %analysis_id, user = %analysis.user_email, "Analysis saved");
    Ok(Json(SaveAnalysisResponse { analysis_id }))
}

/// Lists recent saved analyses, newest first.
async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SavedAnalysis>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(state.analyses.list_recent(limit).await?))
}

/// Fetches one saved analysis.
async fn get_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Result<Json<SavedAnalysis>, ApiError> {
    state
        .analyses
        .get(&analysis_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", analysis_id)))
}

/// Deletes one saved analysis.
async fn delete_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.analyses.delete(&analysis_id).await? {
        return Err(ApiError::NotFound(format!(
            "Analysis {} not found",
            analysis_id
        )));
    }
    Ok(Json(json!({ "message": "Analysis deleted" })))
}

/// Attaches (or replaces) a human evaluation on one analyzed incident.
async fn attach_evaluation(
    State(state): State<AppState>,
    Path((analysis_id, incident_id)): Path<(String, String)>,
    Json(request): Json<EvaluationRequest>,
) -> Result<Json<SavedAnalysis>, ApiError> {
    if request.evaluator_email.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "evaluatorEmail must not be empty".to_string(),
        ));
    }
    if request.recommendation.rating > 5 {
        return Err(ApiError::BadRequest(
            "recommendation rating must be between 0 and 5".to_string(),
        ));
    }

    let evaluation = IncidentEvaluation {
        incident_id,
        evaluator_email: request.evaluator_email,
        evaluation_timestamp: Utc::now(),
        categorization: request.categorization,
        recommendation: request.recommendation,
    };
    let updated = state
        .analyses
        .attach_evaluation(&analysis_id, evaluation)
        .await?;
    Ok(Json(updated))
}

/// Removes the evaluation of one analyzed incident.
async fn detach_evaluation(
    State(state): State<AppState>,
    Path((analysis_id, incident_id)): Path<(String, String)>,
) -> Result<Json<SavedAnalysis>, ApiError> {
    let updated = state
        .analyses
        .detach_evaluation(&analysis_id, &incident_id)
        .await?;
    Ok(Json(updated))
}
