//! Upload history repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use super::{DbError, DbPool};
use crate::import::ImportOutcome;

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub processed: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl UploadRecord {
    /// Builds a record for an import that just finished.
    pub fn from_outcome(source: impl Into<String>, outcome: &ImportOutcome) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            source: source.into(),
            processed: outcome.processed,
            duplicates: outcome.duplicates,
            errors: outcome.errors,
        }
    }
}

/// Repository for the append-only upload history.
#[async_trait]
pub trait UploadHistoryRepository: Send + Sync {
    /// Appends one record. Returns it with its assigned id.
    async fn record(&self, record: &UploadRecord) -> Result<UploadRecord, DbError>;

    /// Lists the most recent uploads, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<UploadRecord>, DbError>;
}

/// SQLite implementation of [`UploadHistoryRepository`].
pub struct SqliteUploadHistoryRepository {
    pool: DbPool,
}

impl SqliteUploadHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadHistoryRepository for SqliteUploadHistoryRepository {
    async fn record(&self, record: &UploadRecord) -> Result<UploadRecord, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO upload_history (created_at, source, processed, duplicates, errors)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.source)
        .bind(record.processed as i64)
        .bind(record.duplicates as i64)
        .bind(record.errors as i64)
        .execute(&self.pool)
        .await?;

        let mut stored = record.clone();
        stored.id = Some(result.last_insert_rowid());
        Ok(stored)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<UploadRecord>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, source, processed, duplicates, errors
            FROM upload_history ORDER BY created_at DESC, id DESC LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: String = row.get("created_at");
            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| DbError::Serialization(e.to_string()))?
                .with_timezone(&Utc);
            records.push(UploadRecord {
                id: Some(row.get::<i64, _>("id")),
                timestamp,
                source: row.get("source"),
                processed: row.get::<i64, _>("processed") as usize,
                duplicates: row.get::<i64, _>("duplicates") as usize,
                errors: row.get::<i64, _>("errors") as usize,
            });
        }
        Ok(records)
    }
}

/// Creates the default repository over a pool.
pub fn create_upload_repository(pool: &DbPool) -> Box<dyn UploadHistoryRepository> {
    Box::new(SqliteUploadHistoryRepository::new(pool.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    #[tokio::test]
    async fn test_record_and_list() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let repo = create_upload_repository(&pool);

        let outcome = ImportOutcome {
            processed: 3,
            duplicates: 1,
            errors: 0,
            incident_ids: vec!["INC-1".to_string()],
        };
        let stored = repo
            .record(&UploadRecord::from_outcome("incidents.txt", &outcome))
            .await
            .unwrap();
        assert!(stored.id.is_some());

        let listed = repo.list_recent(5).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].processed, 3);
        assert_eq!(listed[0].duplicates, 1);
        assert_eq!(listed[0].source, "incidents.txt");
    }
}
