//! Remediation recommendations for tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::usage::TokenUsage;

/// Confidence attached to generated recommendations.
///
/// TODO: derive from model signals once the engine exposes logprobs.
pub const DEFAULT_RECOMMENDATION_CONFIDENCE: f64 = 0.85;

/// A remediation recommendation generated for one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecommendation {
    /// Recommendation id (`REC-<millis>-<suffix>`).
    pub id: String,
    /// The ticket (incident) this recommendation applies to.
    pub ticket_id: String,
    /// Recommendation text.
    pub recommendation: String,
    pub timestamp: DateTime<Utc>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Token usage of the generating call, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl TicketRecommendation {
    /// Creates a recommendation for a ticket with a generated id.
    pub fn new(
        ticket_id: impl Into<String>,
        recommendation: impl Into<String>,
        usage: Option<TokenUsage>,
    ) -> Self {
        let now = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("REC-{}-{}", now.timestamp_millis(), &suffix[..9]),
            ticket_id: ticket_id.into(),
            recommendation: recommendation.into(),
            timestamp: now,
            confidence: DEFAULT_RECOMMENDATION_CONFIDENCE,
            usage,
        }
    }
}
