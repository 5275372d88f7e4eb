//! Deterministic mock engines for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    BatchClassification, ChatEngine, ClassificationEngine, EngineError, RecommendationEngine,
    RecommendationOutput,
};
use crate::classification::Classification;
use crate::incident::Incident;
use crate::taxonomy::Taxonomy;
use crate::usage::TokenUsage;

/// Scripted classification engine.
///
/// Assigns categories round-robin from the taxonomy's allowed set and can be
/// configured to fail on a specific call, duplicate the first returned id, or
/// inject a classification for an id outside the batch.
pub struct MockClassificationEngine {
    model: String,
    usage_per_batch: TokenUsage,
    fail_on_call: Option<usize>,
    duplicate_first: bool,
    foreign_id: Option<String>,
    calls: AtomicUsize,
}

impl MockClassificationEngine {
    pub fn new() -> Self {
        Self {
            model: "mock-classifier".to_string(),
            usage_per_batch: TokenUsage::new(100, 50, 150),
            fail_on_call: None,
            duplicate_first: false,
            foreign_id: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails the `call`-th classify invocation (0-based).
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Appends a duplicate of the first classification to every response.
    pub fn with_duplicate_of_first(mut self) -> Self {
        self.duplicate_first = true;
        self
    }

    /// Appends a classification whose id is not part of the batch.
    pub fn with_foreign_id(mut self, id: impl Into<String>) -> Self {
        self.foreign_id = Some(id.into());
        self
    }

    /// Overrides the usage reported per batch.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage_per_batch = usage;
        self
    }

    /// Number of classify calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClassificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassificationEngine for MockClassificationEngine {
    async fn classify(
        &self,
        batch: &[Incident],
        taxonomy: Taxonomy,
    ) -> Result<BatchClassification, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(call) {
            return Err(EngineError::Request("scripted engine failure".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let mut classifications: Vec<Classification> = batch
            .iter()
            .enumerate()
            .map(|(i, incident)| Classification {
                id: incident.id.clone(),
                category: mock_category(taxonomy, i),
                reason: format!("scripted classification for {}", incident.id),
                timestamp: now.clone(),
            })
            .collect();

        if self.duplicate_first {
            if let Some(first) = classifications.first().cloned() {
                classifications.push(first);
            }
        }
        if let Some(foreign) = &self.foreign_id {
            classifications.push(Classification {
                id: foreign.clone(),
                category: mock_category(taxonomy, 0),
                reason: "scripted foreign classification".to_string(),
                timestamp: now,
            });
        }

        Ok(BatchClassification {
            classifications,
            model: self.model.clone(),
            usage: self.usage_per_batch,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn mock_category(taxonomy: Taxonomy, index: usize) -> String {
    match taxonomy.allowed_categories() {
        Some(allowed) => allowed[index % allowed.len()].to_string(),
        None => format!("Open Category {}", index % 3),
    }
}

/// Scripted recommendation engine.
///
/// Fails for any incident content containing one of the configured markers.
pub struct MockRecommendationEngine {
    model: String,
    usage_per_call: TokenUsage,
    fail_markers: HashSet<String>,
    calls: AtomicUsize,
}

impl MockRecommendationEngine {
    pub fn new() -> Self {
        Self {
            model: "mock-recommender".to_string(),
            usage_per_call: TokenUsage::new(40, 60, 100),
            fail_markers: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails any call whose content contains `marker`.
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.insert(marker.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecommendationEngine for MockRecommendationEngine {
    async fn recommend(&self, incident_content: &str) -> Result<RecommendationOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_markers
            .iter()
            .any(|marker| incident_content.contains(marker.as_str()))
        {
            return Err(EngineError::Request(
                "scripted recommendation failure".to_string(),
            ));
        }
        Ok(RecommendationOutput {
            text: format!(
                "Contain the affected systems and review: {}",
                incident_content.chars().take(40).collect::<String>()
            ),
            usage: self.usage_per_call,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Scripted chat engine echoing the question against the context size.
pub struct MockChatEngine {
    model: String,
}

impl MockChatEngine {
    pub fn new() -> Self {
        Self {
            model: "mock-chat".to_string(),
        }
    }
}

impl Default for MockChatEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatEngine for MockChatEngine {
    async fn answer(
        &self,
        question: &str,
        context: &str,
    ) -> Result<RecommendationOutput, EngineError> {
        Ok(RecommendationOutput {
            text: format!(
                "Answer to \"{}\" grounded in {} context bytes.",
                question,
                context.len()
            ),
            usage: TokenUsage::new(20, 10, 30),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
