//! # ta-core
//!
//! Core domain models and services for Triage Atlas.
//!
//! This crate provides the incident data model, the three classification
//! taxonomies, token-usage accounting, the batched categorization stream
//! producer, the incident store abstraction with embedding-based indexing,
//! and persistence for saved analysis runs.

pub mod analysis;
pub mod classification;
pub mod dedupe;
pub mod engine;
pub mod import;
pub mod incident;
pub mod recommendation;
pub mod stream;
pub mod taxonomy;
pub mod usage;
pub mod vector;

#[cfg(feature = "database")]
pub mod db;

pub use analysis::{
    AnalysisStep, AnalysisSummary, AnalyzedIncidentRecord, CategorizationSet, EvaluationStats,
    IncidentAnalysis, IncidentEvaluation, SavedAnalysis, StepId, StepStatus,
};
pub use classification::{CategoryCount, CategorizationResult, Classification};
pub use dedupe::ContentHashCache;
pub use engine::{
    BatchClassification, ChatEngine, ClassificationEngine, EngineError, RecommendationEngine,
    RecommendationOutput,
};
pub use incident::{Incident, ScoredIncident};
pub use recommendation::TicketRecommendation;
pub use stream::{BatchCategorizer, Progress, StreamEvent, DEFAULT_BATCH_SIZE};
pub use taxonomy::{CategorizationType, Taxonomy};
pub use usage::{CostEstimate, TokenUsage};
pub use vector::{
    Embedder, EmbeddingError, IncidentIndexService, IncidentStore, IndexError, StoreError,
};
