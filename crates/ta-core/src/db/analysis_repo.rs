//! Saved analysis repository.

use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

use super::{DbError, DbPool};
use crate::analysis::{IncidentEvaluation, SavedAnalysis};

/// Repository for persisted analysis documents.
///
/// The collection is append-only except for evaluation attach/detach, which
/// update a document in place, and whole-document deletion.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Persists one analysis document. Returns its `analysis_id`.
    async fn save(&self, analysis: &SavedAnalysis) -> Result<String, DbError>;

    /// Lists the most recent documents, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<SavedAnalysis>, DbError>;

    /// Fetches one document by id.
    async fn get(&self, analysis_id: &str) -> Result<Option<SavedAnalysis>, DbError>;

    /// Deletes one document. Returns whether anything was deleted.
    async fn delete(&self, analysis_id: &str) -> Result<bool, DbError>;

    /// Attaches an evaluation to one incident of a document and recomputes
    /// its aggregate statistics. Returns the updated document.
    async fn attach_evaluation(
        &self,
        analysis_id: &str,
        evaluation: IncidentEvaluation,
    ) -> Result<SavedAnalysis, DbError>;

    /// Detaches the evaluation of one incident. Returns the updated document.
    async fn detach_evaluation(
        &self,
        analysis_id: &str,
        incident_id: &str,
    ) -> Result<SavedAnalysis, DbError>;
}

/// SQLite implementation of [`AnalysisRepository`].
pub struct SqliteAnalysisRepository {
    pool: DbPool,
}

impl SqliteAnalysisRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(&self, analysis_id: &str) -> Result<SavedAnalysis, DbError> {
        let row = sqlx::query("SELECT document FROM analyses WHERE analysis_id = ?")
            .bind(analysis_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "analysis",
                id: analysis_id.to_string(),
            })?;
        let document: String = row.get("document");
        Ok(serde_json::from_str(&document)?)
    }

    async fn store(&self, analysis: &SavedAnalysis) -> Result<(), DbError> {
        let document = serde_json::to_string(analysis)?;
        sqlx::query("UPDATE analyses SET document = ? WHERE analysis_id = ?")
            .bind(&document)
            .bind(&analysis.analysis_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisRepository for SqliteAnalysisRepository {
    #[instrument(skip(self, analysis), fields(analysis_id = %analysis.analysis_id))]
    async fn save(&self, analysis: &SavedAnalysis) -> Result<String, DbError> {
        let document = serde_json::to_string(analysis)?;
        sqlx::query(
            "INSERT INTO analyses (analysis_id, created_at, user_email, document) VALUES (?, ?, ?, ?)",
        )
        .bind(&analysis.analysis_id)
        .bind(analysis.timestamp.to_rfc3339())
        .bind(&analysis.user_email)
        .bind(&document)
        .execute(&self.pool)
        .await?;
        Ok(analysis.analysis_id.clone())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SavedAnalysis>, DbError> {
        let rows = sqlx::query("SELECT document FROM analyses ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut analyses = Vec::with_capacity(rows.len());
        for row in rows {
            let document: String = row.get("document");
            analyses.push(serde_json::from_str(&document)?);
        }
        Ok(analyses)
    }

    async fn get(&self, analysis_id: &str) -> Result<Option<SavedAnalysis>, DbError> {
        match self.load(analysis_id).await {
            Ok(analysis) => Ok(Some(analysis)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, analysis_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM analyses WHERE analysis_id = ?")
            .bind(analysis_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, evaluation), fields(analysis_id = %analysis_id))]
    async fn attach_evaluation(
        &self,
        analysis_id: &str,
        evaluation: IncidentEvaluation,
    ) -> Result<SavedAnalysis, DbError> {
        let mut analysis = self.load(analysis_id).await?;
        let incident_id = evaluation.incident_id.clone();
        if !analysis.attach_evaluation(evaluation) {
            return Err(DbError::NotFound {
                entity: "analyzed incident",
                id: incident_id,
            });
        }
        self.store(&analysis).await?;
        Ok(analysis)
    }

    #[instrument(skip(self), fields(analysis_id = %analysis_id, incident_id = %incident_id))]
    async fn detach_evaluation(
        &self,
        analysis_id: &str,
        incident_id: &str,
    ) -> Result<SavedAnalysis, DbError> {
        let mut analysis = self.load(analysis_id).await?;
        if !analysis.detach_evaluation(incident_id) {
            return Err(DbError::NotFound {
                entity: "incident evaluation",
                id: incident_id.to_string(),
            });
        }
        self.store(&analysis).await?;
        Ok(analysis)
    }
}

/// Creates the default repository over a pool.
pub fn create_analysis_repository(pool: &DbPool) -> Box<dyn AnalysisRepository> {
    Box::new(SqliteAnalysisRepository::new(pool.clone()))
}
