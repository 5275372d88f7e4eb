//! In-memory repository implementations for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    AnalysisRepository, CategorizationRepository, DbError, StoredCategorization,
    UploadHistoryRepository, UploadRecord,
};
use crate::analysis::{IncidentEvaluation, SavedAnalysis};

/// In-memory [`AnalysisRepository`].
#[derive(Default)]
pub struct InMemoryAnalysisRepository {
    analyses: RwLock<HashMap<String, SavedAnalysis>>,
}

impl InMemoryAnalysisRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.analyses.read().await.len()
    }

    /// Whether the repository holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.analyses.read().await.is_empty()
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryAnalysisRepository {
    async fn save(&self, analysis: &SavedAnalysis) -> Result<String, DbError> {
        self.analyses
            .write()
            .await
            .insert(analysis.analysis_id.clone(), analysis.clone());
        Ok(analysis.analysis_id.clone())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SavedAnalysis>, DbError> {
        let analyses = self.analyses.read().await;
        let mut all: Vec<SavedAnalysis> = analyses.values().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit as usize);
        Ok(all)
    }

    async fn get(&self, analysis_id: &str) -> Result<Option<SavedAnalysis>, DbError> {
        Ok(self.analyses.read().await.get(analysis_id).cloned())
    }

    async fn delete(&self, analysis_id: &str) -> Result<bool, DbError> {
        Ok(self.analyses.write().await.remove(analysis_id).is_some())
    }

    async fn attach_evaluation(
        &self,
        analysis_id: &str,
        evaluation: IncidentEvaluation,
    ) -> Result<SavedAnalysis, DbError> {
        let mut analyses = self.analyses.write().await;
        let analysis = analyses.get_mut(analysis_id).ok_or(DbError::NotFound {
            entity: "analysis",
            id: analysis_id.to_string(),
        })?;
        let incident_id = evaluation.incident_id.clone();
        if !analysis.attach_evaluation(evaluation) {
            return Err(DbError::NotFound {
                entity: "analyzed incident",
                id: incident_id,
            });
        }
        Ok(analysis.clone())
    }

    async fn detach_evaluation(
        &self,
        analysis_id: &str,
        incident_id: &str,
    ) -> Result<SavedAnalysis, DbError> {
        let mut analyses = self.analyses.write().await;
        let analysis = analyses.get_mut(analysis_id).ok_or(DbError::NotFound {
            entity: "analysis",
            id: analysis_id.to_string(),
        })?;
        if !analysis.detach_evaluation(incident_id) {
            return Err(DbError::NotFound {
                entity: "incident evaluation",
                id: incident_id.to_string(),
            });
        }
        Ok(analysis.clone())
    }
}

/// In-memory [`CategorizationRepository`].
#[derive(Default)]
pub struct InMemoryCategorizationRepository {
    categorizations: RwLock<Vec<StoredCategorization>>,
}

impl InMemoryCategorizationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategorizationRepository for InMemoryCategorizationRepository {
    async fn save(&self, categorization: &StoredCategorization) -> Result<i64, DbError> {
        let mut categorizations = self.categorizations.write().await;
        let mut stored = categorization.clone();
        let id = categorizations.len() as i64 + 1;
        stored.id = Some(id);
        categorizations.push(stored);
        Ok(id)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StoredCategorization>, DbError> {
        let categorizations = self.categorizations.read().await;
        let mut all: Vec<StoredCategorization> = categorizations.clone();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit as usize);
        Ok(all)
    }
}

/// In-memory [`UploadHistoryRepository`].
#[derive(Default)]
pub struct InMemoryUploadHistoryRepository {
    records: RwLock<Vec<UploadRecord>>,
}

impl InMemoryUploadHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadHistoryRepository for InMemoryUploadHistoryRepository {
    async fn record(&self, record: &UploadRecord) -> Result<UploadRecord, DbError> {
        let mut records = self.records.write().await;
        let mut stored = record.clone();
        stored.id = Some(records.len() as i64 + 1);
        records.push(stored.clone());
        Ok(stored)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<UploadRecord>, DbError> {
        let records = self.records.read().await;
        let mut all: Vec<UploadRecord> = records.clone();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit as usize);
        Ok(all)
    }
}
