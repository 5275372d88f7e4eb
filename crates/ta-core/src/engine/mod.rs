//! Language-model engine abstractions.
//!
//! The engines are the seams to the external model provider: batch
//! classification under a taxonomy, per-ticket recommendation generation,
//! and grounded chat answers. Implementations live in `ta-engines`;
//! deterministic mocks live in [`mock`].

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::classification::Classification;
use crate::incident::Incident;
use crate::taxonomy::Taxonomy;
use crate::usage::TokenUsage;

/// Errors surfaced by engine calls.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Request(String),

    #[error("engine returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("engine authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("engine rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("engine call timed out: {0}")]
    Timeout(String),
}

/// Raw classification output for one batch, before id validation.
///
/// The engine enforces the exactly-once id rule only through prompt
/// instructions; callers must still validate ids against the batch.
#[derive(Debug, Clone)]
pub struct BatchClassification {
    pub classifications: Vec<Classification>,
    /// Model id that served the call.
    pub model: String,
    pub usage: TokenUsage,
}

/// Classifies incident batches under a taxonomy.
#[async_trait]
pub trait ClassificationEngine: Send + Sync {
    /// Classifies every incident of `batch` under `taxonomy`.
    ///
    /// The returned list may contain duplicate or foreign ids; validation is
    /// the caller's responsibility.
    async fn classify(
        &self,
        batch: &[Incident],
        taxonomy: Taxonomy,
    ) -> Result<BatchClassification, EngineError>;

    /// Model id used for classification calls.
    fn model_id(&self) -> &str;
}

/// Text output of a generation call, with its token usage.
#[derive(Debug, Clone)]
pub struct RecommendationOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// Generates remediation recommendations from raw incident content.
#[async_trait]
pub trait RecommendationEngine: Send + Sync {
    async fn recommend(&self, incident_content: &str) -> Result<RecommendationOutput, EngineError>;

    /// Model id used for recommendation calls.
    fn model_id(&self) -> &str;
}

/// Answers analyst questions grounded in retrieved incident context.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Answers `question` using only the supplied incident `context`.
    async fn answer(
        &self,
        question: &str,
        context: &str,
    ) -> Result<RecommendationOutput, EngineError>;

    /// Model id used for chat calls.
    fn model_id(&self) -> &str;
}
