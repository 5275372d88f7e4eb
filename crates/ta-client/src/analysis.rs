//! Multi-stage analysis runner.
//!
//! Runs the full pipeline (fetch incidents, categorize under all three
//! taxonomies, generate one recommendation per incident, persist) as a
//! single cancellable unit of work with step-level status tracking.
//!
//! Steps execute in a fixed order. A failed categorization stream marks its
//! step `error` and the pipeline continues with the remaining taxonomies; a
//! failed fetch halts the pipeline and leaves later steps `pending`.
//! Cancellation is cooperative, checked at every suspension point, and never
//! treated as a failure.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{info, instrument, warn};

use ta_core::{
    AnalysisStep, CategorizationSet, Incident, IncidentAnalysis, SavedAnalysis, StepId,
    StepStatus, Taxonomy, TicketRecommendation, TokenUsage,
};

use crate::api_client::{ApiClient, ClientError};
use crate::cancel::CancellationToken;
use crate::consumer::{CategorizationConsumer, ConsumeError};
use crate::events::EventStream;

/// Operations the runner needs from the API. The HTTP client implements
/// this; tests inject scripted backends.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Fetches the full incident list, most recent first.
    async fn fetch_incidents(&self) -> Result<Vec<Incident>, ClientError>;

    /// Opens one categorization stream.
    async fn open_categorization_stream(
        &self,
        taxonomy: Taxonomy,
        incidents: &[Incident],
    ) -> Result<EventStream, ClientError>;

    /// Generates one recommendation.
    async fn recommend(&self, ticket_id: &str) -> Result<TicketRecommendation, ClientError>;

    /// Persists a completed analysis. Returns the stored id.
    async fn save_analysis(&self, analysis: &SavedAnalysis) -> Result<String, ClientError>;
}

#[async_trait]
impl AnalysisBackend for ApiClient {
    async fn fetch_incidents(&self) -> Result<Vec<Incident>, ClientError> {
        ApiClient::fetch_incidents(self).await
    }

    async fn open_categorization_stream(
        &self,
        taxonomy: Taxonomy,
        incidents: &[Incident],
    ) -> Result<EventStream, ClientError> {
        ApiClient::open_categorization_stream(self, taxonomy, incidents).await
    }

    async fn recommend(&self, ticket_id: &str) -> Result<TicketRecommendation, ClientError> {
        ApiClient::recommend(self, ticket_id).await
    }

    async fn save_analysis(&self, analysis: &SavedAnalysis) -> Result<String, ClientError> {
        ApiClient::save_analysis(self, analysis).await
    }
}

/// Errors that halt an analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A run is already in flight; concurrent runs are rejected.
    #[error("an analysis run is already in progress")]
    RunInProgress,

    #[error("no incidents found in the incident store")]
    NoIncidents,

    #[error("failed to fetch incidents: {0}")]
    Fetch(#[source] ClientError),
}

/// Accumulated categorization usage, per taxonomy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorizationTokens {
    pub cert: Option<TokenUsage>,
    pub llm: Option<TokenUsage>,
    pub nist: Option<TokenUsage>,
}

impl CategorizationTokens {
    fn set(&mut self, taxonomy: Taxonomy, usage: TokenUsage) {
        match taxonomy {
            Taxonomy::Cert => self.cert = Some(usage),
            Taxonomy::Llm => self.llm = Some(usage),
            Taxonomy::Nist => self.nist = Some(usage),
        }
    }
}

/// Final state of one run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub results: Vec<IncidentAnalysis>,
    pub categorizations: CategorizationSet,
    pub categorization_tokens: CategorizationTokens,
    /// Id assigned by the result store, when the run was persisted.
    pub saved_id: Option<String>,
    /// Persistence failure message; in-memory results remain valid.
    pub persistence_error: Option<String>,
    /// True when the run was cancelled; nothing was persisted.
    pub cancelled: bool,
    pub steps: Vec<AnalysisStep>,
}

/// Drives the fetch → cert → llm → nist → recommendations → persist pipeline.
pub struct AnalysisRunner {
    backend: Arc<dyn AnalysisBackend>,
    /// Authenticated identity; persistence is skipped without one.
    identity: Option<String>,
    steps: RwLock<Vec<AnalysisStep>>,
    cancel_slot: Mutex<Option<CancellationToken>>,
    running: Arc<AtomicBool>,
}

impl AnalysisRunner {
    /// Creates a runner over a backend.
    pub fn new(backend: Arc<dyn AnalysisBackend>, identity: Option<String>) -> Self {
        Self {
            backend,
            identity,
            steps: RwLock::new(AnalysisStep::initial_steps()),
            cancel_slot: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current step list snapshot.
    pub fn steps(&self) -> Vec<AnalysisStep> {
        self.steps.read().expect("steps lock poisoned").clone()
    }

    /// Signals cancellation of the in-flight run, if any.
    ///
    /// In-flight awaits abort at their next cancellation check; steps keep
    /// their last observed status and nothing further is persisted.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel_slot.lock().expect("cancel lock poisoned").as_ref() {
            info!("Analysis cancellation requested");
            token.cancel();
        }
    }

    /// Runs the full pipeline over the first `incident_count` fetched
    /// incidents.
    ///
    /// Rejects re-entrant calls while a run is in flight. All state from a
    /// prior run is reset before the pipeline starts.
    #[instrument(skip(self), fields(incident_count = incident_count))]
    pub async fn start(&self, incident_count: usize) -> Result<AnalysisOutcome, AnalysisError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AnalysisError::RunInProgress);
        }
        let _guard = RunGuard {
            flag: Arc::clone(&self.running),
        };

        // Fresh run state: steps, cancellation token, prior results gone.
        *self.steps.write().expect("steps lock poisoned") = AnalysisStep::initial_steps();
        let cancel = CancellationToken::new();
        *self.cancel_slot.lock().expect("cancel lock poisoned") = Some(cancel.clone());

        let result = self.run_pipeline(incident_count, &cancel).await;
        *self.cancel_slot.lock().expect("cancel lock poisoned") = None;
        result
    }

    async fn run_pipeline(
        &self,
        incident_count: usize,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let mut categorizations = CategorizationSet::default();
        let mut categorization_tokens = CategorizationTokens::default();
        let mut results: Vec<IncidentAnalysis> = Vec::new();

        // Stage 1: fetch.
        self.update_step(StepId::Fetch, StepStatus::Processing, None, None);
        let incidents = match self.backend.fetch_incidents().await {
            Ok(incidents) => incidents,
            Err(e) => {
                self.update_step(StepId::Fetch, StepStatus::Error, None, None);
                return Err(AnalysisError::Fetch(e));
            }
        };
        if cancel.is_cancelled() {
            return Ok(self.cancelled_outcome(results, categorizations, categorization_tokens));
        }
        if incidents.is_empty() {
            self.update_step(StepId::Fetch, StepStatus::Error, None, None);
            return Err(AnalysisError::NoIncidents);
        }
        let limited: Vec<Incident> = incidents.into_iter().take(incident_count).collect();
        self.update_step(StepId::Fetch, StepStatus::Completed, None, None);

        // Stages 2-4: one categorization stream per taxonomy. A failed
        // taxonomy marks its step and the run continues with the rest.
        for taxonomy in Taxonomy::ALL {
            if cancel.is_cancelled() {
                return Ok(self.cancelled_outcome(results, categorizations, categorization_tokens));
            }
            let step = StepId::for_taxonomy(taxonomy);
            self.update_step(
                step,
                StepStatus::Processing,
                Some(0),
                Some(format!(
                    "Categorizing with {}: 0 of {}",
                    taxonomy.display_name(),
                    limited.len()
                )),
            );

            match self.run_categorization(taxonomy, &limited, cancel).await {
                Ok((result, usage)) => {
                    categorizations.set(taxonomy, result);
                    categorization_tokens.set(taxonomy, usage);
                    self.update_step(step, StepStatus::Completed, None, None);
                }
                Err(ConsumeError::Cancelled) => {
                    return Ok(self.cancelled_outcome(
                        results,
                        categorizations,
                        categorization_tokens,
                    ));
                }
                Err(e) => {
                    warn!(taxonomy = %taxonomy, error = %e, "Categorization failed, continuing");
                    self.update_step(step, StepStatus::Error, None, None);
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(self.cancelled_outcome(results, categorizations, categorization_tokens));
        }

        // Stage 5: one recommendation per incident, sequentially. Individual
        // failures leave that incident without a recommendation.
        self.update_step(
            StepId::Recommendations,
            StepStatus::Processing,
            Some(0),
            Some(format!("Generating recommendations: 0 of {}", limited.len())),
        );
        let total = limited.len();
        for (index, incident) in limited.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled_outcome(results, categorizations, categorization_tokens));
            }

            let recommendation = match self.backend.recommend(&incident.id).await {
                Ok(recommendation) => Some(recommendation),
                Err(e) => {
                    if cancel.is_cancelled() {
                        return Ok(self.cancelled_outcome(
                            results,
                            categorizations,
                            categorization_tokens,
                        ));
                    }
                    warn!(incident_id = %incident.id, error = %e, "Recommendation failed, skipping");
                    None
                }
            };

            results.push(IncidentAnalysis::build(
                incident,
                &categorizations,
                recommendation,
            ));

            let done = index + 1;
            let percentage = ((done as f64 / total as f64) * 100.0).round() as u32;
            self.update_step(
                StepId::Recommendations,
                StepStatus::Processing,
                Some(percentage),
                Some(format!("Generating recommendations: {} of {}", done, total)),
            );
        }
        self.update_step(StepId::Recommendations, StepStatus::Completed, None, None);
        self.update_step(StepId::Complete, StepStatus::Completed, None, None);

        // Persistence: only for uncancelled runs with results and an
        // authenticated identity. Failure keeps the in-memory results.
        let mut saved_id = None;
        let mut persistence_error = None;
        if !cancel.is_cancelled() && !results.is_empty() {
            if let Some(identity) = &self.identity {
                let document =
                    SavedAnalysis::build(identity.clone(), &results, &categorizations, incident_count);
                match self.backend.save_analysis(&document).await {
                    Ok(id) => {
                        info!(analysis_id = %id, "Analysis persisted");
                        saved_id = Some(id);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to persist analysis");
                        persistence_error = Some(e.to_string());
                    }
                }
            }
        }

        Ok(AnalysisOutcome {
            results,
            categorizations,
            categorization_tokens,
            saved_id,
            persistence_error,
            cancelled: false,
            steps: self.steps(),
        })
    }

    async fn run_categorization(
        &self,
        taxonomy: Taxonomy,
        incidents: &[Incident],
        cancel: &CancellationToken,
    ) -> Result<(ta_core::CategorizationResult, TokenUsage), ConsumeError> {
        let mut stream = self
            .backend
            .open_categorization_stream(taxonomy, incidents)
            .await?;

        let step = StepId::for_taxonomy(taxonomy);
        let consumer = CategorizationConsumer::new(taxonomy, incidents.len());
        let consumed = consumer
            .consume(&mut stream, cancel, |percentage, text| {
                self.update_step(step, StepStatus::Processing, Some(percentage), Some(text));
            })
            .await?;
        Ok((consumed.result, consumed.accumulated_usage))
    }

    fn cancelled_outcome(
        &self,
        results: Vec<IncidentAnalysis>,
        categorizations: CategorizationSet,
        categorization_tokens: CategorizationTokens,
    ) -> AnalysisOutcome {
        AnalysisOutcome {
            results,
            categorizations,
            categorization_tokens,
            saved_id: None,
            persistence_error: None,
            cancelled: true,
            steps: self.steps(),
        }
    }

    fn update_step(
        &self,
        id: StepId,
        status: StepStatus,
        progress: Option<u32>,
        progress_text: Option<String>,
    ) {
        let mut steps = self.steps.write().expect("steps lock poisoned");
        if let Some(step) = steps.iter_mut().find(|s| s.id == id) {
            step.status = status;
            step.progress = progress;
            step.progress_text = progress_text;
        }
    }
}

struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use ta_core::{CategorizationResult, Classification, Progress, StreamEvent};
    use tokio::sync::Notify;

    fn incidents(n: usize) -> Vec<Incident> {
        (0..n)
            .map(|i| Incident {
                id: format!("INC-{}", i),
                content: format!("incident {}", i),
                timestamp: chrono::Utc::now(),
                source: Some("test".to_string()),
            })
            .collect()
    }

    /// Builds the scripted event sequence of a categorization stream.
    /// `fail_after` emits an error event after that many batches.
    fn scripted_events(
        taxonomy: Taxonomy,
        incidents: &[Incident],
        batch_size: usize,
        fail_after: Option<usize>,
    ) -> Vec<StreamEvent> {
        let total = incidents.len();
        let usage = TokenUsage::new(100, 50, 150);
        let mut events = vec![StreamEvent::Init {
            total,
            batch_size,
        }];
        let mut processed = 0;
        for (index, batch) in incidents.chunks(batch_size).enumerate() {
            if fail_after == Some(index) {
                events.push(StreamEvent::Error {
                    message: "scripted stream failure".to_string(),
                });
                return events;
            }
            processed += batch.len();
            let classifications: Vec<Classification> = batch
                .iter()
                .map(|incident| Classification {
                    id: incident.id.clone(),
                    category: match taxonomy.allowed_categories() {
                        Some(allowed) => allowed[0].to_string(),
                        None => "Scripted".to_string(),
                    },
                    reason: "scripted".to_string(),
                    timestamp: "t".to_string(),
                })
                .collect();
            events.push(StreamEvent::Batch {
                data: CategorizationResult::from_classifications(
                    classifications,
                    "test-model",
                    taxonomy.categorization_type(),
                    usage,
                ),
                progress: Progress::of(processed, total),
                usage,
            });
        }
        events.push(StreamEvent::Complete {
            total_tokens_global: Some(usage),
        });
        events
    }

    type RecommendHook = Box<dyn Fn() + Send + Sync>;

    struct MockBackend {
        incidents: Vec<Incident>,
        fail_streams_after: HashMap<Taxonomy, usize>,
        failing_recommendations: HashSet<String>,
        saved: Mutex<Vec<SavedAnalysis>>,
        recommend_hook: Mutex<Option<RecommendHook>>,
        fetch_gate: Option<Arc<Notify>>,
    }

    impl MockBackend {
        fn new(count: usize) -> Self {
            Self {
                incidents: incidents(count),
                fail_streams_after: HashMap::new(),
                failing_recommendations: HashSet::new(),
                saved: Mutex::new(Vec::new()),
                recommend_hook: Mutex::new(None),
                fetch_gate: None,
            }
        }

        fn saved_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AnalysisBackend for MockBackend {
        async fn fetch_incidents(&self) -> Result<Vec<Incident>, ClientError> {
            if let Some(gate) = &self.fetch_gate {
                gate.notified().await;
            }
            Ok(self.incidents.clone())
        }

        async fn open_categorization_stream(
            &self,
            taxonomy: Taxonomy,
            incidents: &[Incident],
        ) -> Result<EventStream, ClientError> {
            let fail_after = self.fail_streams_after.get(&taxonomy).copied();
            Ok(EventStream::from_events(scripted_events(
                taxonomy, incidents, 10, fail_after,
            )))
        }

        async fn recommend(&self, ticket_id: &str) -> Result<TicketRecommendation, ClientError> {
            if let Some(hook) = self.recommend_hook.lock().unwrap().as_ref() {
                hook();
            }
            if self.failing_recommendations.contains(ticket_id) {
                return Err(ClientError::Status {
                    status: 500,
                    message: "scripted recommendation failure".to_string(),
                });
            }
            Ok(TicketRecommendation::new(
                ticket_id,
                "scripted recommendation",
                Some(TokenUsage::new(10, 20, 30)),
            ))
        }

        async fn save_analysis(&self, analysis: &SavedAnalysis) -> Result<String, ClientError> {
            self.saved.lock().unwrap().push(analysis.clone());
            Ok(analysis.analysis_id.clone())
        }
    }

    fn step_status(steps: &[AnalysisStep], id: StepId) -> StepStatus {
        steps.iter().find(|s| s.id == id).unwrap().status
    }

    #[tokio::test]
    async fn test_full_run_persists_with_identity() {
        let backend = Arc::new(MockBackend::new(5));
        let runner =
            AnalysisRunner::new(backend.clone(), Some("analyst@example.com".to_string()));

        let outcome = runner.start(5).await.unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.categorizations.completed_count(), 3);
        assert!(outcome.saved_id.is_some());
        assert_eq!(backend.saved_count(), 1);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.recommendation.is_some() && r.cert_category.is_some()));
        for id in StepId::ALL {
            assert_eq!(step_status(&outcome.steps, id), StepStatus::Completed);
        }

        let saved = backend.saved.lock().unwrap();
        assert_eq!(saved[0].user_email, "analyst@example.com");
        assert_eq!(saved[0].total_incidents, 5);
    }

    #[tokio::test]
    async fn test_incident_count_limits_the_run() {
        let backend = Arc::new(MockBackend::new(30));
        let runner = AnalysisRunner::new(backend, None);

        let outcome = runner.start(12).await.unwrap();
        assert_eq!(outcome.results.len(), 12);
    }

    #[tokio::test]
    async fn test_failed_taxonomy_does_not_halt_pipeline() {
        // Scenario: cert errors after two batches; llm and nist succeed.
        let mut backend = MockBackend::new(25);
        backend.fail_streams_after.insert(Taxonomy::Cert, 2);
        let backend = Arc::new(backend);
        let runner =
            AnalysisRunner::new(backend.clone(), Some("analyst@example.com".to_string()));

        let outcome = runner.start(25).await.unwrap();

        assert!(outcome.categorizations.cert.is_none());
        assert!(outcome.categorizations.llm.is_some());
        assert!(outcome.categorizations.nist.is_some());
        assert!(outcome.categorization_tokens.cert.is_none());

        assert_eq!(step_status(&outcome.steps, StepId::Cert), StepStatus::Error);
        assert_eq!(
            step_status(&outcome.steps, StepId::Recommendations),
            StepStatus::Completed
        );

        // Rows carry the surviving taxonomies only.
        assert!(outcome.results.iter().all(|r| r.cert_category.is_none()));
        assert!(outcome.results.iter().all(|r| r.llm_category.is_some()));
        assert!(outcome.saved_id.is_some());
    }

    #[tokio::test]
    async fn test_recommendation_failure_skips_that_incident() {
        let mut backend = MockBackend::new(3);
        backend.failing_recommendations.insert("INC-1".to_string());
        let backend = Arc::new(backend);
        let runner = AnalysisRunner::new(backend, None);

        let outcome = runner.start(3).await.unwrap();
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results[0].recommendation.is_some());
        assert!(outcome.results[1].recommendation.is_none());
        assert!(outcome.results[2].recommendation.is_some());
        assert_eq!(
            step_status(&outcome.steps, StepId::Recommendations),
            StepStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_no_identity_skips_persistence() {
        let backend = Arc::new(MockBackend::new(2));
        let runner = AnalysisRunner::new(backend.clone(), None);

        let outcome = runner.start(2).await.unwrap();
        assert!(outcome.saved_id.is_none());
        assert_eq!(backend.saved_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_during_recommendations_persists_nothing() {
        let backend = Arc::new(MockBackend::new(5));
        let runner = Arc::new(AnalysisRunner::new(
            backend.clone(),
            Some("analyst@example.com".to_string()),
        ));

        // First recommendation call trips the cancellation signal; the loop
        // aborts at its next check.
        {
            let runner = Arc::clone(&runner);
            *backend.recommend_hook.lock().unwrap() =
                Some(Box::new(move || runner.cancel()));
        }

        let outcome = runner.start(5).await.unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.saved_id.is_none());
        assert_eq!(backend.saved_count(), 0);
        assert!(outcome.results.len() < 5);

        // Later steps keep their last observed state.
        assert_eq!(
            step_status(&outcome.steps, StepId::Complete),
            StepStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_empty_store_halts_with_fetch_error() {
        let backend = Arc::new(MockBackend::new(0));
        let runner = AnalysisRunner::new(backend, None);

        let err = runner.start(10).await.unwrap_err();
        assert!(matches!(err, AnalysisError::NoIncidents));
        let steps = runner.steps();
        assert_eq!(step_status(&steps, StepId::Fetch), StepStatus::Error);
        assert_eq!(step_status(&steps, StepId::Cert), StepStatus::Pending);
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_rejected() {
        let mut backend = MockBackend::new(2);
        let gate = Arc::new(Notify::new());
        backend.fetch_gate = Some(Arc::clone(&gate));
        let backend = Arc::new(backend);
        let runner = Arc::new(AnalysisRunner::new(backend, None));

        let first = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.start(2).await })
        };
        // Let the first run reach the gated fetch.
        tokio::task::yield_now().await;

        let err = runner.start(2).await.unwrap_err();
        assert!(matches!(err, AnalysisError::RunInProgress));

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(!outcome.cancelled);

        // After the first run finishes, a new run is accepted again.
        gate.notify_one();
        let second = runner.start(2).await.unwrap();
        assert_eq!(second.results.len(), 2);
    }
}
