//! Result store for Triage Atlas.
//!
//! Persists saved analysis runs and upload history using SQLx over SQLite.
//! Documents are stored as JSON columns; evaluations are updated in place on
//! their parent analysis document.

mod error;
mod pool;

pub mod analysis_repo;
pub mod categorization_repo;
pub mod mocks;
pub mod upload_repo;

pub use analysis_repo::{create_analysis_repository, AnalysisRepository};
pub use categorization_repo::{
    create_categorization_repository, CategorizationRepository, StoredCategorization,
};
pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbPool};
pub use upload_repo::{create_upload_repository, UploadHistoryRepository, UploadRecord};
