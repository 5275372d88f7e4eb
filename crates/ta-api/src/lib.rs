//! # ta-api
//!
//! HTTP API for Triage Atlas: incident ingestion and search, the batched
//! categorization SSE stream, ticket recommendations, grounded chat, and
//! saved-analysis persistence with human evaluations.

pub mod dto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use server::{ApiServer, ApiServerConfig};
pub use state::AppState;
