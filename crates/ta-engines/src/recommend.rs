//! Recommendation and chat generation over the Gemini client.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use ta_core::{ChatEngine, EngineError, RecommendationEngine, RecommendationOutput};

use crate::gemini::{GeminiClient, GenerateRequest, GenerationConfig};

const GENERATION_TEMPERATURE: f64 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 4000;

const RECOMMENDATION_SYSTEM_PROMPT: &str = "\
You are an information security specialist. Analyze the provided security \
incident and suggest practical, specific recommendations to resolve the \
problem and prevent similar occurrences in the future. Provide objective, \
actionable recommendations.";

const CHAT_SYSTEM_PROMPT: &str = "\
You are an assistant specialized in information security. Use ONLY the \
information provided below to answer. If the provided context does not \
contain enough relevant information, answer exactly: \"I could not find \
enough information to answer this question.\"";

/// [`RecommendationEngine`] backed by Gemini text generation.
pub struct GeminiRecommendationEngine {
    client: Arc<GeminiClient>,
}

impl GeminiRecommendationEngine {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecommendationEngine for GeminiRecommendationEngine {
    #[instrument(skip(self, incident_content))]
    async fn recommend(&self, incident_content: &str) -> Result<RecommendationOutput, EngineError> {
        let prompt = format!(
            "Analyze this incident and provide recommendations:\n{}",
            incident_content
        );
        let generated = self
            .client
            .generate(GenerateRequest::single_turn(
                Some(RECOMMENDATION_SYSTEM_PROMPT),
                &prompt,
                GenerationConfig::text(GENERATION_TEMPERATURE, GENERATION_MAX_TOKENS),
            ))
            .await?;

        Ok(RecommendationOutput {
            text: generated.text,
            usage: generated.usage,
        })
    }

    fn model_id(&self) -> &str {
        self.client.model()
    }
}

/// [`ChatEngine`] answering questions grounded in retrieved incidents.
pub struct GeminiChatEngine {
    client: Arc<GeminiClient>,
}

impl GeminiChatEngine {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatEngine for GeminiChatEngine {
    #[instrument(skip(self, question, context))]
    async fn answer(
        &self,
        question: &str,
        context: &str,
    ) -> Result<RecommendationOutput, EngineError> {
        let system = format!("{}\n\nIncident context:\n{}", CHAT_SYSTEM_PROMPT, context);
        let generated = self
            .client
            .generate(GenerateRequest::single_turn(
                Some(&system),
                question,
                GenerationConfig::text(GENERATION_TEMPERATURE, GENERATION_MAX_TOKENS),
            ))
            .await?;

        Ok(RecommendationOutput {
            text: generated.text,
            usage: generated.usage,
        })
    }

    fn model_id(&self) -> &str {
        self.client.model()
    }
}
