//! Saved categorization result repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use super::{DbError, DbPool};
use crate::classification::CategorizationResult;

/// One persisted categorization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCategorization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub result: CategorizationResult,
}

impl StoredCategorization {
    /// Wraps a result for persistence, stamped now.
    pub fn new(result: CategorizationResult) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            result,
        }
    }
}

/// Append-only repository for categorization results.
#[async_trait]
pub trait CategorizationRepository: Send + Sync {
    /// Appends one result. Returns its assigned id.
    async fn save(&self, categorization: &StoredCategorization) -> Result<i64, DbError>;

    /// Lists the most recent results, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<StoredCategorization>, DbError>;
}

/// SQLite implementation of [`CategorizationRepository`].
pub struct SqliteCategorizationRepository {
    pool: DbPool,
}

impl SqliteCategorizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategorizationRepository for SqliteCategorizationRepository {
    async fn save(&self, categorization: &StoredCategorization) -> Result<i64, DbError> {
        let document = serde_json::to_string(&categorization.result)?;
        let result =
            sqlx::query("INSERT INTO categorizations (created_at, document) VALUES (?, ?)")
                .bind(categorization.timestamp.to_rfc3339())
                .bind(&document)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StoredCategorization>, DbError> {
        let rows = sqlx::query(
            "SELECT id, created_at, document FROM categorizations ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: String = row.get("created_at");
            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| DbError::Serialization(e.to_string()))?
                .with_timezone(&Utc);
            let document: String = row.get("document");
            stored.push(StoredCategorization {
                id: Some(row.get::<i64, _>("id")),
                timestamp,
                result: serde_json::from_str(&document)?,
            });
        }
        Ok(stored)
    }
}

/// Creates the default repository over a pool.
pub fn create_categorization_repository(pool: &DbPool) -> Box<dyn CategorizationRepository> {
    Box::new(SqliteCategorizationRepository::new(pool.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use crate::taxonomy::CategorizationType;

    #[tokio::test]
    async fn test_save_and_list() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let repo = create_categorization_repository(&pool);

        let result = CategorizationResult::empty("test-model", CategorizationType::Cert);
        let id = repo.save(&StoredCategorization::new(result.clone())).await.unwrap();
        assert!(id > 0);

        let listed = repo.list_recent(5).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].result, result);
        assert_eq!(listed[0].id, Some(id));
    }
}
