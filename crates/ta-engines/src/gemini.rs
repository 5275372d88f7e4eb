//! HTTP client for the Google Generative Language API.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use ta_core::{EngineError, TokenUsage};

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Default embedding model (768-dimensional output).
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Creates a configuration with default models and endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Overrides the generation model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the API endpoint (used against test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Thin client over the generateContent / embedContent endpoints.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Creates a client. Fails only if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Model id used for generation calls.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Runs one generation call and returns the concatenated text plus usage.
    pub async fn generate(&self, request: GenerateRequest) -> Result<Generated, EngineError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(e.to_string())
                } else {
                    EngineError::Request(e.to_string())
                }
            })?;

        let response = check_status(response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let text = body.text();
        if text.is_empty() {
            return Err(EngineError::InvalidResponse(
                "response contained no candidate text".to_string(),
            ));
        }
        let usage = body.usage();
        debug!(
            model = %self.config.model,
            total_tokens = usage.total_tokens,
            "Generation call finished"
        );
        Ok(Generated { text, usage })
    }

    /// Embeds one text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let url = format!(
            "{}/models/{}:embedContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.embedding_model
        );

        let request = EmbedRequest {
            content: Content::user(text),
        };
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        let response = check_status(response).await?;
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        Ok(body.embedding.values)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, "Model API call failed");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
            EngineError::AuthenticationFailed(format!("status {}", status)),
        ),
        StatusCode::TOO_MANY_REQUESTS => Err(EngineError::RateLimited(60)),
        _ => Err(EngineError::Request(format!(
            "status {}: {}",
            status,
            body.chars().take(300).collect::<String>()
        ))),
    }
}

/// One generation call's output.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub usage: TokenUsage,
}

/// Request body for generateContent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    /// A single-turn request with an optional system instruction.
    pub fn single_turn(
        system: Option<&str>,
        prompt: &str,
        generation_config: GenerationConfig,
    ) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            system_instruction: system.map(Content::system),
            generation_config,
        }
    }
}

/// One content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// Generation tuning parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

impl GenerationConfig {
    /// Low-temperature config forcing a JSON response body.
    pub fn json(temperature: f64, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            response_mime_type: Some("application/json".to_string()),
        }
    }

    /// Plain-text generation config.
    pub fn text(temperature: f64, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            response_mime_type: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }

    fn usage(&self) -> TokenUsage {
        self.usage_metadata
            .as_ref()
            .map(|u| {
                TokenUsage::new(
                    u.prompt_token_count,
                    u.candidates_token_count,
                    u.total_token_count,
                )
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest::single_turn(
            Some("You are an assistant."),
            "Classify this.",
            GenerationConfig::json(0.1, 4000),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4000);
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json["systemInstruction"].is_object());
    }

    #[test]
    fn test_response_text_and_usage_extraction() {
        let body = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "hello "}, {"text": "world"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3, "totalTokenCount": 10}
        }"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), "hello world");
        let usage = response.usage();
        assert_eq!(usage.prompt_tokens, 7);
        assert_eq!(usage.total_tokens, 10);
    }

    #[test]
    fn test_response_without_usage_defaults_to_zero() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "x"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();
        assert!(response.usage().is_zero());
    }
}
