//! HTTP client for the Triage Atlas API.

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use ta_core::{Incident, SavedAnalysis, ScoredIncident, Taxonomy, TicketRecommendation};

use crate::events::EventStream;

/// Errors from client-side API calls.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to reach the API: {0}")]
    Transport(String),

    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode API response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Typed client for the Triage Atlas HTTP API.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    /// Authenticated identity forwarded to the API, when present.
    user_email: Option<String>,
}

impl ApiClient {
    /// Creates a client against `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_email: None,
        })
    }

    /// Attaches the authenticated identity sent with write requests.
    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    /// The configured identity, if any.
    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    /// Fetches the full incident list (simple format).
    pub async fn fetch_incidents(&self) -> Result<Vec<Incident>, ClientError> {
        self.get_json("/api/incidents/search?format=simple").await
    }

    /// Runs a similarity search.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredIncident>, ClientError> {
        #[derive(Deserialize)]
        struct SearchResponse {
            results: Vec<ScoredIncident>,
        }
        let path = format!(
            "/api/incidents/search?query={}&topK={}",
            urlencode(query),
            top_k
        );
        let response: SearchResponse = self.get_json(&path).await?;
        Ok(response.results)
    }

    /// Imports separator-delimited incident text.
    pub async fn import_text(
        &self,
        content: &str,
        source: &str,
    ) -> Result<serde_json::Value, ClientError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ImportRequest<'a> {
            content: &'a str,
            source: &'a str,
        }
        self.post_json("/api/incidents/import", &ImportRequest { content, source })
            .await
    }

    /// Opens a categorization stream for the given taxonomy and incidents.
    ///
    /// Fails if the connection cannot be established or the server answers
    /// with a non-success status before the first frame.
    pub async fn open_categorization_stream(
        &self,
        taxonomy: Taxonomy,
        incidents: &[Incident],
    ) -> Result<EventStream, ClientError> {
        #[derive(Serialize)]
        struct StreamRequest<'a> {
            #[serde(rename = "type")]
            taxonomy: Taxonomy,
            incidents: &'a [Incident],
        }

        let url = format!("{}/api/ai/categorization/stream", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&StreamRequest {
                taxonomy,
                incidents,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let transport = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from));
        Ok(EventStream::new(transport))
    }

    /// Requests a synchronous recommendation for one ticket.
    pub async fn recommend(&self, ticket_id: &str) -> Result<TicketRecommendation, ClientError> {
        let url = format!("{}/api/tickets/{}/recommend", self.base_url, ticket_id);
        let response = self.client.post(&url).send().await?;
        Self::read_json(response).await
    }

    /// Persists a completed analysis. Returns the stored `analysis_id`.
    pub async fn save_analysis(&self, analysis: &SavedAnalysis) -> Result<String, ClientError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SaveResponse {
            analysis_id: String,
        }
        let response: SaveResponse = self.post_json("/api/analyses", analysis).await?;
        Ok(response.analysis_id)
    }

    /// Lists recent saved analyses.
    pub async fn recent_analyses(&self, limit: u32) -> Result<Vec<SavedAnalysis>, ClientError> {
        self.get_json(&format!("/api/analyses?limit={}", limit)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;
        Self::read_json(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(text);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
