//! Incident data model for Triage Atlas.
//!
//! An incident is one imported report: a block of free text with a stable
//! identifier and an ingestion timestamp. Incidents are immutable once
//! created; identity is the `id` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A security incident report held in the incident store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier (`INC-<millis>-<suffix>` for locally created reports).
    pub id: String,
    /// Raw report text.
    pub content: String,
    /// Ingestion timestamp.
    pub timestamp: DateTime<Utc>,
    /// Where the report came from (upload, direct input, importer name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Incident {
    /// Creates a new incident with a generated id and the current timestamp.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_incident_id(now),
            content: content.into(),
            timestamp: now,
            source: Some(source.into()),
        }
    }
}

/// An incident paired with a similarity score from a vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredIncident {
    #[serde(flatten)]
    pub incident: Incident,
    /// Cosine similarity against the query embedding.
    pub score: f32,
}

fn generate_incident_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("INC-{}-{}", now.timestamp_millis(), &suffix[..9])
}
