//! Batch stream producer.
//!
//! Drives the categorization of a full incident set to completion, one
//! fixed-size batch at a time, emitting [`StreamEvent`]s in order through an
//! mpsc channel. The producer owns no persistence; its only side effect is
//! the emitted stream.

use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::{Progress, StreamEvent};
use crate::classification::{CategorizationResult, Classification};
use crate::engine::ClassificationEngine;
use crate::incident::Incident;
use crate::taxonomy::Taxonomy;
use crate::usage::TokenUsage;

/// Incidents per engine call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Produces a categorization stream over an injected classification engine.
pub struct BatchCategorizer {
    engine: Arc<dyn ClassificationEngine>,
    batch_size: usize,
}

impl BatchCategorizer {
    /// Creates a producer with the default batch size.
    pub fn new(engine: Arc<dyn ClassificationEngine>) -> Self {
        Self {
            engine,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the batch size (clamped to at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Spawns the producer and returns the receiving end of the stream.
    ///
    /// Events arrive in emission order; the channel closes after the terminal
    /// event. Dropping the receiver aborts the remaining batches.
    pub fn stream(
        self: Arc<Self>,
        incidents: Vec<Incident>,
        taxonomy: Taxonomy,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            self.run(incidents, taxonomy, tx).await;
        });
        rx
    }

    /// Runs the full batch loop, sending events into `tx`.
    ///
    /// A send failure means the consumer is gone; the loop stops without
    /// invoking the engine again.
    #[instrument(skip(self, incidents, tx), fields(taxonomy = %taxonomy, total = incidents.len()))]
    pub async fn run(
        &self,
        incidents: Vec<Incident>,
        taxonomy: Taxonomy,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let total = incidents.len();
        let mut processed = 0usize;
        let mut accumulated = TokenUsage::default();

        if tx
            .send(StreamEvent::Init {
                total,
                batch_size: self.batch_size,
            })
            .await
            .is_err()
        {
            return;
        }

        for batch in incidents.chunks(self.batch_size) {
            let outcome = match self.engine.classify(batch, taxonomy).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(taxonomy = %taxonomy, error = %e, "Categorization batch failed");
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: format!("Failed to categorize incident batch ({}): {}", taxonomy, e),
                        })
                        .await;
                    return;
                }
            };

            processed += batch.len();
            accumulated.accumulate(&outcome.usage);

            let validated = validate_batch_classifications(batch, outcome.classifications);
            let data = CategorizationResult::from_classifications(
                validated,
                outcome.model,
                taxonomy.categorization_type(),
                outcome.usage,
            );

            debug!(
                taxonomy = %taxonomy,
                processed = processed,
                survivors = data.classifications.len(),
                "Categorized batch"
            );
            counter!("ta_categorization_batches_total").increment(1);
            counter!("ta_categorization_tokens_total").increment(outcome.usage.total_tokens);

            if tx
                .send(StreamEvent::Batch {
                    data,
                    progress: Progress::of(processed, total),
                    usage: outcome.usage,
                })
                .await
                .is_err()
            {
                return;
            }
        }

        let _ = tx
            .send(StreamEvent::Complete {
                total_tokens_global: Some(accumulated),
            })
            .await;
    }
}

/// Drops classifications whose id is not in the batch or already appeared in
/// this batch's output. First occurrence wins; rejects are silent apart from
/// a log line.
fn validate_batch_classifications(
    batch: &[Incident],
    classifications: Vec<Classification>,
) -> Vec<Classification> {
    let batch_ids: HashSet<&str> = batch.iter().map(|i| i.id.as_str()).collect();
    let mut accepted_ids: HashSet<String> = HashSet::new();
    let mut validated = Vec::with_capacity(classifications.len());

    for classification in classifications {
        if !batch_ids.contains(classification.id.as_str()) {
            warn!(id = %classification.id, "Dropping classification for id outside the batch");
            continue;
        }
        if !accepted_ids.insert(classification.id.clone()) {
            warn!(id = %classification.id, "Dropping duplicate classification");
            continue;
        }
        validated.push(classification);
    }

    validated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockClassificationEngine;

    fn incidents(n: usize) -> Vec<Incident> {
        (0..n)
            .map(|i| Incident {
                id: format!("INC-{}", i),
                content: format!("incident number {}", i),
                timestamp: chrono::Utc::now(),
                source: Some("test".to_string()),
            })
            .collect()
    }

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_25_incidents_in_batches_of_10() {
        let engine = Arc::new(MockClassificationEngine::new());
        let producer = Arc::new(BatchCategorizer::new(engine));
        let events = collect(producer.stream(incidents(25), Taxonomy::Cert)).await;

        assert_eq!(events.len(), 5); // init + 3 batches + complete
        assert!(matches!(
            events[0],
            StreamEvent::Init {
                total: 25,
                batch_size: 10
            }
        ));

        let batches: Vec<&Progress> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Batch { progress, .. } => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(
            batches.iter().map(|p| p.processed).collect::<Vec<_>>(),
            vec![10, 20, 25]
        );
        assert_eq!(
            batches.iter().map(|p| p.percentage).collect::<Vec<_>>(),
            vec![40, 80, 100]
        );
        assert!(matches!(events.last(), Some(StreamEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_and_foreign_ids_are_filtered() {
        let engine = Arc::new(
            MockClassificationEngine::new()
                .with_duplicate_of_first()
                .with_foreign_id("INC-does-not-exist"),
        );
        let producer = Arc::new(BatchCategorizer::new(engine));
        let events = collect(producer.stream(incidents(10), Taxonomy::Nist)).await;

        let data = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::Batch { data, .. } => Some(data),
                _ => None,
            })
            .expect("one batch event");

        // 10 valid + 1 duplicate + 1 foreign in, 10 unique survivors out.
        assert_eq!(data.classifications.len(), 10);
        let mut ids: Vec<&str> = data.classifications.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert!(!ids.contains(&"INC-does-not-exist"));
    }

    #[test]
    fn test_validation_of_a_malformed_engine_response() {
        // Nine distinct valid ids, one of them returned twice, plus one
        // foreign id. Nine unique, valid classifications survive.
        let batch = incidents(10);
        let now = chrono::Utc::now().to_rfc3339();
        let mut returned: Vec<Classification> = batch[..8]
            .iter()
            .map(|incident| Classification {
                id: incident.id.clone(),
                category: "Scan".to_string(),
                reason: "r".to_string(),
                timestamp: now.clone(),
            })
            .collect();
        returned.push(returned[0].clone());
        returned.push(Classification {
            id: batch[8].id.clone(),
            category: "DoS".to_string(),
            reason: "r".to_string(),
            timestamp: now.clone(),
        });
        returned.push(Classification {
            id: "INC-foreign".to_string(),
            category: "Web".to_string(),
            reason: "r".to_string(),
            timestamp: now,
        });
        assert_eq!(returned.len(), 11);

        let validated = validate_batch_classifications(&batch, returned);
        assert_eq!(validated.len(), 9);
        let mut ids: Vec<&str> = validated.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 9);
    }

    #[tokio::test]
    async fn test_engine_failure_emits_error_and_stops() {
        let engine = Arc::new(MockClassificationEngine::new().with_failure_on_call(1));
        let producer = Arc::new(BatchCategorizer::new(engine));
        let events = collect(producer.stream(incidents(30), Taxonomy::Llm)).await;

        // init + first batch + error; batches two and three never run.
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], StreamEvent::Batch { .. }));
        match &events[2] {
            StreamEvent::Error { message } => assert!(message.contains("LLM")),
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_input_completes_immediately() {
        let engine = Arc::new(MockClassificationEngine::new());
        let producer = Arc::new(BatchCategorizer::new(engine.clone()));
        let events = collect(producer.stream(Vec::new(), Taxonomy::Cert)).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Init { total: 0, .. }));
        match &events[1] {
            StreamEvent::Complete { total_tokens_global } => {
                assert!(total_tokens_global.unwrap().is_zero());
            }
            other => panic!("expected complete event, got {:?}", other),
        }
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_complete_carries_sum_of_batch_usage() {
        let engine = Arc::new(
            MockClassificationEngine::new().with_usage(TokenUsage::new(100, 20, 120)),
        );
        let producer = Arc::new(BatchCategorizer::new(engine));
        let events = collect(producer.stream(incidents(25), Taxonomy::Cert)).await;

        let batch_total: u64 = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Batch { usage, .. } => Some(usage.total_tokens),
                _ => None,
            })
            .sum();
        match events.last() {
            Some(StreamEvent::Complete {
                total_tokens_global: Some(global),
            }) => {
                assert_eq!(global.total_tokens, batch_total);
                assert_eq!(global.total_tokens, 3 * 120);
            }
            other => panic!("expected complete event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_final_batch_uses_input_length() {
        let engine = Arc::new(MockClassificationEngine::new());
        let producer = Arc::new(BatchCategorizer::new(engine).with_batch_size(4));
        let events = collect(producer.stream(incidents(6), Taxonomy::Cert)).await;

        let processed: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Batch { progress, .. } => Some(progress.processed),
                _ => None,
            })
            .collect();
        assert_eq!(processed, vec![4, 6]);
    }
}
