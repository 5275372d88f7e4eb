//! In-memory incident store with cosine similarity search.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{IncidentStore, StoreError};
use crate::incident::{Incident, ScoredIncident};

/// In-memory [`IncidentStore`] used for development and tests.
pub struct InMemoryIncidentStore {
    dimension: usize,
    records: RwLock<HashMap<String, StoredRecord>>,
}

struct StoredRecord {
    incident: Incident,
    embedding: Vec<f32>,
}

impl InMemoryIncidentStore {
    /// Creates an empty store expecting embeddings of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), StoreError> {
        if embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn upsert(&self, incident: &Incident, embedding: &[f32]) -> Result<(), StoreError> {
        self.check_dimension(embedding)?;
        let mut records = self.records.write().await;
        records.insert(
            incident.id.clone(),
            StoredRecord {
                incident: incident.clone(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredIncident>, StoreError> {
        self.check_dimension(embedding)?;
        let records = self.records.read().await;

        let mut scored: Vec<ScoredIncident> = records
            .values()
            .map(|record| ScoredIncident {
                incident: record.incident.clone(),
                score: cosine_similarity(embedding, &record.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list_all(&self) -> Result<Vec<Incident>, StoreError> {
        let records = self.records.read().await;
        let mut incidents: Vec<Incident> =
            records.values().map(|r| r.incident.clone()).collect();
        // Most recent first; id as tie-break for deterministic output.
        incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        Ok(incidents)
    }

    async fn get(&self, id: &str) -> Result<Option<Incident>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(id).map(|r| r.incident.clone()))
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incident(id: &str, content: &str) -> Incident {
        Incident {
            id: id.to_string(),
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            source: Some("test".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_get_and_count() {
        let store = InMemoryIncidentStore::new(4);
        store
            .upsert(&incident("a", "brute force"), &[1.0, 0.0, 0.0, 0.0])
            .await
            .unwrap();
        store
            .upsert(&incident("a", "brute force (edited)"), &[1.0, 0.0, 0.0, 0.0])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.content, "brute force (edited)");
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryIncidentStore::new(2);
        store
            .upsert(&incident("close", "a"), &[1.0, 0.0])
            .await
            .unwrap();
        store
            .upsert(&incident("far", "b"), &[0.0, 1.0])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1], 10).await.unwrap();
        assert_eq!(results[0].incident.id, "close");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let store = InMemoryIncidentStore::new(4);
        let err = store
            .upsert(&incident("a", "x"), &[1.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = InMemoryIncidentStore::new(2);
        store
            .upsert(&incident("a", "x"), &[1.0, 0.0])
            .await
            .unwrap();
        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
