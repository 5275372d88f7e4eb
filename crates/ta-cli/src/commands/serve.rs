//! Server wiring for the `serve` command.

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use ta_api::{ApiServer, ApiServerConfig, AppState};
use ta_core::db::{
    create_analysis_repository, create_categorization_repository, create_pool,
    create_upload_repository,
};
use ta_core::engine::mock::{MockChatEngine, MockClassificationEngine, MockRecommendationEngine};
use ta_core::vector::{InMemoryIncidentStore, MockEmbedder, DEFAULT_EMBEDDING_DIMENSION};
use ta_core::{ContentHashCache, IncidentIndexService};
use ta_engines::{
    GeminiChatEngine, GeminiClassificationEngine, GeminiClient, GeminiConfig, GeminiEmbedder,
    GeminiRecommendationEngine,
};
use ta_observability::init_metrics;

use crate::config::AppConfig;

/// Parameters for the `serve` command.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub enable_swagger: bool,
    /// Run with scripted mock engines instead of the model provider.
    pub offline: bool,
}

/// Builds the application state and runs the API server.
pub async fn run_server(serve: ServeConfig, config: AppConfig) -> Result<()> {
    let bind_address: SocketAddr = format!("{}:{}", serve.host, serve.port)
        .parse()
        .context("invalid bind address")?;

    let pool = create_pool(&serve.database_url)
        .await
        .context("failed to open the result store")?;
    let analyses = Arc::from(create_analysis_repository(&pool));
    let categorizations = Arc::from(create_categorization_repository(&pool));
    let uploads = Arc::from(create_upload_repository(&pool));

    let store = Arc::new(InMemoryIncidentStore::new(DEFAULT_EMBEDDING_DIMENSION));
    let dedupe = ContentHashCache::default();

    let mut state = if serve.offline {
        warn!("Running with mock engines; categorizations and recommendations are scripted");
        let embedder = Arc::new(MockEmbedder::new(DEFAULT_EMBEDDING_DIMENSION));
        let index = Arc::new(IncidentIndexService::new(store, embedder, dedupe));
        AppState::new(
            index,
            Arc::new(MockClassificationEngine::new()),
            Arc::new(MockRecommendationEngine::new()),
            Arc::new(MockChatEngine::new()),
            analyses,
            categorizations,
            uploads,
        )
    } else {
        let Some(api_key) = config.gemini_api_key.clone() else {
            bail!("GEMINI_API_KEY is not set; set it or pass --offline for mock engines");
        };
        let mut gemini_config = GeminiConfig::new(api_key);
        if let Some(model) = &config.model {
            gemini_config = gemini_config.with_model(model.clone());
        }
        let client = Arc::new(GeminiClient::new(gemini_config)?);
        info!(model = %client.model(), "Model engines ready");

        let embedder = Arc::new(GeminiEmbedder::new(Arc::clone(&client)));
        let index = Arc::new(IncidentIndexService::new(store, embedder, dedupe));
        AppState::new(
            index,
            Arc::new(GeminiClassificationEngine::new(Arc::clone(&client))),
            Arc::new(GeminiRecommendationEngine::new(Arc::clone(&client))),
            Arc::new(GeminiChatEngine::new(client)),
            analyses,
            categorizations,
            uploads,
        )
    };

    if let Some(batch_size) = config.batch_size {
        state = state.with_batch_size(batch_size);
    }
    match init_metrics() {
        Ok(handle) => state = state.with_prometheus_handle(handle),
        Err(e) => warn!(error = %e, "Metrics recorder not installed"),
    }

    let server = ApiServer::new(
        state,
        ApiServerConfig {
            bind_address,
            enable_swagger: serve.enable_swagger,
            ..ApiServerConfig::default()
        },
    );
    server.run().await.context("server failed")
}
