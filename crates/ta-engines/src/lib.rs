//! # ta-engines
//!
//! Language-model engine implementations for Triage Atlas, backed by the
//! Google Generative Language API. The engine traits themselves live in
//! `ta-core::engine`; this crate provides the HTTP client, the per-taxonomy
//! classification prompts, recommendation and chat generation, and the
//! embedding client.

mod classifier;
mod embedder;
mod gemini;
mod recommend;

pub use classifier::GeminiClassificationEngine;
pub use embedder::GeminiEmbedder;
pub use gemini::{GeminiClient, GeminiConfig, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL};
pub use recommend::{GeminiChatEngine, GeminiRecommendationEngine};
