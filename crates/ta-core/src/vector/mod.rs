//! Incident store abstraction.
//!
//! The incident store is a vector database holding one embedding plus
//! metadata per incident. The trait mirrors the operations the rest of the
//! system needs: similarity search, full-scan retrieval, point lookup,
//! upsert, and wipe. The bundled implementation is in-memory; remote stores
//! plug in behind the same trait.

mod embeddings;
mod memory;

pub use embeddings::{
    Embedder, EmbeddingError, IncidentIndexService, IndexError, MockEmbedder,
    DEFAULT_EMBEDDING_DIMENSION, RELEVANCE_RESULT_CAP, RELEVANCE_THRESHOLD_RATIO,
};
pub use memory::InMemoryIncidentStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::incident::{Incident, ScoredIncident};

/// Errors surfaced by incident store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("incident store unavailable: {0}")]
    Unavailable(String),

    #[error("incident store internal error: {0}")]
    Internal(String),
}

/// Vector store holding incident embeddings and metadata.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Inserts or replaces an incident and its embedding.
    async fn upsert(&self, incident: &Incident, embedding: &[f32]) -> Result<(), StoreError>;

    /// Returns up to `top_k` incidents by similarity to `embedding`,
    /// highest score first.
    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredIncident>, StoreError>;

    /// Returns every stored incident, most recent first.
    async fn list_all(&self) -> Result<Vec<Incident>, StoreError>;

    /// Looks up one incident by id.
    async fn get(&self, id: &str) -> Result<Option<Incident>, StoreError>;

    /// Removes every stored incident.
    async fn delete_all(&self) -> Result<(), StoreError>;

    /// Number of stored incidents.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Whether the store is reachable.
    async fn health_check(&self) -> bool;
}
