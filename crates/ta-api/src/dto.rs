//! Request and response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use ta_core::{Incident, ScoredIncident, Taxonomy, TicketRecommendation, TokenUsage};

/// Incident as carried over the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncidentDto {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<Incident> for IncidentDto {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            content: incident.content,
            timestamp: incident.timestamp,
            source: incident.source,
        }
    }
}

impl From<IncidentDto> for Incident {
    fn from(dto: IncidentDto) -> Self {
        Self {
            id: dto.id,
            content: dto.content,
            timestamp: dto.timestamp,
            source: dto.source,
        }
    }
}

/// Incident with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoredIncidentDto {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub score: f32,
}

impl From<ScoredIncident> for ScoredIncidentDto {
    fn from(scored: ScoredIncident) -> Self {
        Self {
            id: scored.incident.id,
            content: scored.incident.content,
            timestamp: scored.incident.timestamp,
            source: scored.incident.source,
            score: scored.score,
        }
    }
}

/// Body for adding one incident via direct input.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddIncidentRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    pub source: Option<String>,
}

/// Body for a text import.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    /// Declared file type; only "txt" is supported.
    pub file_type: Option<String>,
    pub source: Option<String>,
}

/// Import outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub message: String,
    pub processed: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub incident_ids: Vec<String>,
    pub details: String,
}

/// Query parameters for incident search.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: Option<String>,
    pub top_k: Option<usize>,
    /// "simple" (bare incidents) or "detailed" (scored results).
    pub format: Option<String>,
}

/// Scored search results (detailed format).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<ScoredIncidentDto>,
}

/// Body initiating a categorization stream.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CategorizationStreamRequest {
    /// Taxonomy selector: "cert", "llm" or "nist".
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub taxonomy: Taxonomy,
    pub incidents: Vec<IncidentDto>,
}

/// Ticket listing with a next-page hint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketsResponse {
    pub tickets: Vec<IncidentDto>,
    pub has_more: bool,
}

/// Query parameters for ticket listing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TicketsQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Token usage on the wire.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageDto {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<TokenUsage> for UsageDto {
    fn from(usage: TokenUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Generated recommendation for a ticket.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub id: String,
    pub ticket_id: String,
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageDto>,
}

impl From<TicketRecommendation> for RecommendationResponse {
    fn from(rec: TicketRecommendation) -> Self {
        Self {
            id: rec.id,
            ticket_id: rec.ticket_id,
            recommendation: rec.recommendation,
            timestamp: rec.timestamp,
            confidence: rec.confidence,
            usage: rec.usage.map(UsageDto::from),
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChatMessageDto {
    pub role: String,
    pub content: String,
}

/// Body for the chat stream.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessageDto>,
}

/// Response after persisting an analysis.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnalysisResponse {
    pub analysis_id: String,
}

/// Body attaching a human evaluation to an analyzed incident.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub evaluator_email: String,
    pub categorization: ta_core::analysis::CategorizationJudgement,
    pub recommendation: ta_core::analysis::RecommendationRating,
}

/// Health report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub incident_store: bool,
    pub indexed_incidents: usize,
}
