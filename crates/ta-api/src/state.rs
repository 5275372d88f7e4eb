//! Application state shared across handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use ta_core::db::{AnalysisRepository, CategorizationRepository, UploadHistoryRepository};
use ta_core::import::TextImporter;
use ta_core::{
    ChatEngine, ClassificationEngine, IncidentIndexService, RecommendationEngine,
    DEFAULT_BATCH_SIZE,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Incident index: embedding, dedup, search.
    pub index: Arc<IncidentIndexService>,
    /// Text importer over the index.
    pub importer: Arc<TextImporter>,
    /// Batch classification engine.
    pub classifier: Arc<dyn ClassificationEngine>,
    /// Recommendation engine.
    pub recommender: Arc<dyn RecommendationEngine>,
    /// Grounded chat engine.
    pub chat: Arc<dyn ChatEngine>,
    /// Saved analysis repository.
    pub analyses: Arc<dyn AnalysisRepository>,
    /// Saved categorization repository.
    pub categorizations: Arc<dyn CategorizationRepository>,
    /// Upload history repository.
    pub uploads: Arc<dyn UploadHistoryRepository>,
    /// Incidents per categorization batch.
    pub batch_size: usize,
    /// Prometheus metrics handle for rendering metrics.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates the application state.
    pub fn new(
        index: Arc<IncidentIndexService>,
        classifier: Arc<dyn ClassificationEngine>,
        recommender: Arc<dyn RecommendationEngine>,
        chat: Arc<dyn ChatEngine>,
        analyses: Arc<dyn AnalysisRepository>,
        categorizations: Arc<dyn CategorizationRepository>,
        uploads: Arc<dyn UploadHistoryRepository>,
    ) -> Self {
        Self {
            importer: Arc::new(TextImporter::new(Arc::clone(&index))),
            index,
            classifier,
            recommender,
            chat,
            analyses,
            categorizations,
            uploads,
            batch_size: DEFAULT_BATCH_SIZE,
            prometheus_handle: None,
        }
    }

    /// Overrides the categorization batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Attaches a Prometheus handle for the metrics endpoint.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }
}
