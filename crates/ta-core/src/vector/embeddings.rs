//! Embedding abstraction and the incident index service.
//!
//! The index service ties together an [`Embedder`], an [`IncidentStore`] and
//! a [`ContentHashCache`] for content-level duplicate detection. It is the
//! single write path into the incident store.

use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{IncidentStore, StoreError};
use crate::dedupe::ContentHashCache;
use crate::incident::{Incident, ScoredIncident};

/// Default embedding dimension (text-embedding-004).
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Relevance search keeps results scoring at least this fraction of the top
/// score. A fixed threshold either drowns the caller in matches or returns
/// nothing, depending on the query; scaling to the best match adapts per
/// query.
pub const RELEVANCE_THRESHOLD_RATIO: f32 = 0.85;

/// Upper bound on relevance search results, to bound downstream inference
/// cost.
pub const RELEVANCE_RESULT_CAP: usize = 100;

/// Candidate pool size fetched before the dynamic threshold is applied.
const RELEVANCE_CANDIDATE_POOL: usize = 1000;

/// Errors from embedding generation.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding response invalid: {0}")]
    InvalidResponse(String),
}

/// Errors from index service operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The content is already present in the store.
    #[error("duplicate incident content")]
    DuplicateContent,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Generates text embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Output vector dimension.
    fn dimension(&self) -> usize;
}

/// Deterministic embedder for tests: hashes character n-grams into a fixed
/// dimension and normalizes, so equal texts embed identically and similar
/// texts land close.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];
        let bytes = text.as_bytes();
        for window in bytes.windows(3.min(bytes.len().max(1))) {
            let mut hash: usize = 5381;
            for b in window {
                hash = hash.wrapping_mul(33).wrapping_add(*b as usize);
            }
            vector[hash % self.dimension] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embeds, deduplicates, and indexes incidents; answers semantic queries.
pub struct IncidentIndexService {
    store: Arc<dyn IncidentStore>,
    embedder: Arc<dyn Embedder>,
    dedupe: ContentHashCache,
}

impl IncidentIndexService {
    /// Creates an index service over a store and embedder.
    pub fn new(
        store: Arc<dyn IncidentStore>,
        embedder: Arc<dyn Embedder>,
        dedupe: ContentHashCache,
    ) -> Self {
        Self {
            store,
            embedder,
            dedupe,
        }
    }

    /// Indexes one incident.
    ///
    /// With `check_duplicate`, content already present in the store is
    /// rejected with [`IndexError::DuplicateContent`]. The dedup cache is
    /// re-synced from the store on a cache miss before declaring the content
    /// new, so a cold cache does not admit duplicates.
    #[instrument(skip(self, incident), fields(incident_id = %incident.id))]
    pub async fn index_incident(
        &self,
        incident: &Incident,
        check_duplicate: bool,
    ) -> Result<(), IndexError> {
        if check_duplicate {
            if self.dedupe.contains(&incident.content).await {
                return Err(IndexError::DuplicateContent);
            }
            self.dedupe.sync_with_store(self.store.as_ref()).await?;
            if self.dedupe.contains(&incident.content).await {
                return Err(IndexError::DuplicateContent);
            }
        }

        let embedding = self.embedder.embed(&incident.content).await?;
        self.store.upsert(incident, &embedding).await?;
        self.dedupe.insert(&incident.content).await;

        counter!("ta_incidents_indexed_total").increment(1);
        debug!(incident_id = %incident.id, "Indexed incident");
        Ok(())
    }

    /// Raw similarity search.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredIncident>, IndexError> {
        let embedding = self.embedder.embed(query).await?;
        Ok(self.store.search(&embedding, top_k).await?)
    }

    /// Relevance search with a dynamic cutoff.
    ///
    /// Keeps matches scoring at least [`RELEVANCE_THRESHOLD_RATIO`] of the
    /// best match, capped at [`RELEVANCE_RESULT_CAP`] results.
    #[instrument(skip(self, query))]
    pub async fn search_relevant(&self, query: &str) -> Result<Vec<ScoredIncident>, IndexError> {
        let mut matches = self.search(query, RELEVANCE_CANDIDATE_POOL).await?;
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let max_score = matches.first().map(|m| m.score).unwrap_or(0.0);
        let threshold = max_score * RELEVANCE_THRESHOLD_RATIO;

        matches.retain(|m| m.score >= threshold);
        matches.truncate(RELEVANCE_RESULT_CAP);
        Ok(matches)
    }

    /// Returns every indexed incident.
    pub async fn list_all(&self) -> Result<Vec<Incident>, IndexError> {
        Ok(self.store.list_all().await?)
    }

    /// Looks up one incident by id.
    pub async fn get(&self, id: &str) -> Result<Option<Incident>, IndexError> {
        Ok(self.store.get(id).await?)
    }

    /// Drops every record and clears the dedup cache.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), IndexError> {
        self.store.delete_all().await?;
        self.dedupe.clear().await;
        info!("Incident store and dedup cache cleared");
        Ok(())
    }

    /// Number of indexed incidents.
    pub async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.store.count().await?)
    }

    /// Whether the backing store is reachable.
    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::InMemoryIncidentStore;
    use std::time::Duration;

    fn service() -> IncidentIndexService {
        let store = Arc::new(InMemoryIncidentStore::new(64));
        let embedder = Arc::new(MockEmbedder::new(64));
        IncidentIndexService::new(store, embedder, ContentHashCache::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_duplicate_content_is_rejected() {
        let service = service();
        let first = Incident::new("ssh brute force against bastion host", "test");
        let second = Incident::new("ssh brute force against bastion host", "test");

        service.index_incident(&first, true).await.unwrap();
        let err = service.index_incident(&second, true).await.unwrap_err();
        assert!(matches!(err, IndexError::DuplicateContent));
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_detection_survives_cold_cache() {
        let store: Arc<dyn IncidentStore> = Arc::new(InMemoryIncidentStore::new(64));
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(64));

        let warm = IncidentIndexService::new(
            store.clone(),
            embedder.clone(),
            ContentHashCache::new(Duration::from_secs(60)),
        );
        warm.index_incident(&Incident::new("dns tunnelling detected", "test"), true)
            .await
            .unwrap();

        // Fresh service over the same store: cache starts empty and must
        // re-sync before admitting the content.
        let cold = IncidentIndexService::new(
            store,
            embedder,
            ContentHashCache::new(Duration::from_secs(60)),
        );
        let err = cold
            .index_incident(&Incident::new("dns tunnelling detected", "test"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DuplicateContent));
    }

    #[tokio::test]
    async fn test_relevant_search_applies_dynamic_threshold() {
        let service = service();
        service
            .index_incident(
                &Incident::new("phishing campaign targeting finance team", "test"),
                false,
            )
            .await
            .unwrap();
        service
            .index_incident(
                &Incident::new("phishing email with credential harvesting link", "test"),
                false,
            )
            .await
            .unwrap();
        service
            .index_incident(
                &Incident::new("disk usage alert on backup server", "test"),
                false,
            )
            .await
            .unwrap();

        let results = service
            .search_relevant("phishing campaign credential theft")
            .await
            .unwrap();
        assert!(!results.is_empty());
        let max = results[0].score;
        for result in &results {
            assert!(result.score >= max * RELEVANCE_THRESHOLD_RATIO);
        }
    }

    #[tokio::test]
    async fn test_clear_resets_store_and_cache() {
        let service = service();
        let incident = Incident::new("unexpected outbound traffic spike", "test");
        service.index_incident(&incident, true).await.unwrap();

        service.clear().await.unwrap();
        assert_eq!(service.count().await.unwrap(), 0);

        // Same content is indexable again after a wipe.
        service
            .index_incident(&Incident::new("unexpected outbound traffic spike", "t"), true)
            .await
            .unwrap();
    }
}
