//! Embedding client implementing the core [`Embedder`] trait.

use async_trait::async_trait;
use std::sync::Arc;

use ta_core::{Embedder, EmbeddingError, EngineError};

use crate::gemini::GeminiClient;

/// 768-dimensional embeddings via text-embedding-004.
pub struct GeminiEmbedder {
    client: Arc<GeminiClient>,
    dimension: usize,
}

impl GeminiEmbedder {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self {
            client,
            dimension: ta_core::vector::DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let values = self.client.embed(text).await.map_err(|e| match e {
            EngineError::InvalidResponse(msg) => EmbeddingError::InvalidResponse(msg),
            other => EmbeddingError::Request(other.to_string()),
        })?;

        if values.len() != self.dimension {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                values.len()
            )));
        }
        Ok(values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
