//! # ta-client
//!
//! Consuming side of the Triage Atlas API: the SSE frame decoder, a typed
//! HTTP client, the per-taxonomy categorization stream consumer, and the
//! multi-stage analysis runner with step tracking and cooperative
//! cancellation.

mod analysis;
mod api_client;
mod cancel;
mod consumer;
mod decoder;
mod events;

pub use analysis::{
    AnalysisBackend, AnalysisError, AnalysisOutcome, AnalysisRunner, CategorizationTokens,
};
pub use api_client::{ApiClient, ClientError};
pub use cancel::CancellationToken;
pub use consumer::{CategorizationConsumer, ConsumeError, ConsumedCategorization};
pub use decoder::SseDecoder;
pub use events::EventStream;
