//! Per-taxonomy categorization stream consumer.
//!
//! Folds one categorization stream into a single aggregated result plus
//! cumulative token usage, deduplicating classifications across batches and
//! reporting incremental progress. Deduplication here guards against
//! duplicate *delivery*; the producer already guards against duplicate
//! *production* within a batch.

use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, instrument};

use ta_core::{
    CategorizationResult, Classification, Progress, StreamEvent, Taxonomy, TokenUsage,
};

use crate::api_client::ClientError;
use crate::cancel::CancellationToken;
use crate::events::EventStream;

/// Errors from consuming one categorization stream.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// Cancellation was signalled. Not a failure; never surfaced to users.
    #[error("categorization cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] ClientError),

    /// The stream delivered an `error` event.
    #[error("categorization failed: {0}")]
    Stream(String),

    /// The transport closed without a terminal event.
    #[error("categorization stream ended without completing")]
    Incomplete,
}

/// Aggregated outcome of one fully consumed stream.
#[derive(Debug, Clone)]
pub struct ConsumedCategorization {
    pub result: CategorizationResult,
    /// Usage accumulated across every batch of the stream.
    pub accumulated_usage: TokenUsage,
}

/// Consumes one categorization stream end-to-end.
pub struct CategorizationConsumer {
    taxonomy: Taxonomy,
    total_incidents: usize,
}

impl CategorizationConsumer {
    /// Creates a consumer for a stream categorizing `total_incidents`
    /// incidents under `taxonomy`.
    pub fn new(taxonomy: Taxonomy, total_incidents: usize) -> Self {
        Self {
            taxonomy,
            total_incidents,
        }
    }

    /// Drains `stream` to its terminal event.
    ///
    /// `on_progress` receives the accumulated percentage and a
    /// human-readable progress line after every batch. The cancellation
    /// token is checked before each event is processed; once it trips, no
    /// further state is emitted.
    #[instrument(skip(self, stream, cancel, on_progress), fields(taxonomy = %self.taxonomy))]
    pub async fn consume<F>(
        &self,
        stream: &mut EventStream,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ConsumedCategorization, ConsumeError>
    where
        F: FnMut(u32, String) + Send,
    {
        let mut classifications: Vec<Classification> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut accumulated_usage = TokenUsage::default();
        let mut snapshot: Option<CategorizationResult> = None;
        let mut completed = false;

        loop {
            if cancel.is_cancelled() {
                return Err(ConsumeError::Cancelled);
            }

            let event = match stream.next_event().await? {
                Some(event) => event,
                None => break,
            };
            if cancel.is_cancelled() {
                return Err(ConsumeError::Cancelled);
            }

            match event {
                StreamEvent::Init { total, batch_size } => {
                    debug!(total, batch_size, "Categorization stream opened");
                }
                StreamEvent::Batch { data, usage, .. } => {
                    let fresh: Vec<Classification> = data
                        .classifications
                        .iter()
                        .filter(|c| !seen_ids.contains(&c.id))
                        .cloned()
                        .collect();
                    for classification in &fresh {
                        seen_ids.insert(classification.id.clone());
                    }
                    classifications.extend(fresh);
                    accumulated_usage.accumulate(&usage);

                    let progress = Progress::of(classifications.len(), self.total_incidents);
                    on_progress(
                        progress.percentage,
                        format!(
                            "Categorizing with {}: {} of {}",
                            self.taxonomy.display_name(),
                            classifications.len(),
                            self.total_incidents
                        ),
                    );

                    snapshot = Some(CategorizationResult::from_classifications(
                        classifications.clone(),
                        data.model,
                        data.categorization_type,
                        accumulated_usage,
                    ));
                }
                StreamEvent::Complete { .. } => {
                    completed = true;
                }
                StreamEvent::Error { message } => {
                    return Err(ConsumeError::Stream(message));
                }
            }
        }

        if !completed {
            return Err(ConsumeError::Incomplete);
        }

        // An empty stream (zero incidents) completes without any batch.
        let result = match snapshot {
            Some(result) => result,
            None if self.total_incidents == 0 => CategorizationResult::from_classifications(
                Vec::new(),
                "unknown",
                self.taxonomy.categorization_type(),
                accumulated_usage,
            ),
            None => return Err(ConsumeError::Incomplete),
        };

        Ok(ConsumedCategorization {
            result,
            accumulated_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ta_core::taxonomy::CategorizationType;

    fn classification(id: &str, category: &str) -> Classification {
        Classification {
            id: id.to_string(),
            category: category.to_string(),
            reason: "r".to_string(),
            timestamp: "t".to_string(),
        }
    }

    fn batch_event(
        classifications: Vec<Classification>,
        processed: usize,
        total: usize,
        usage: TokenUsage,
    ) -> StreamEvent {
        StreamEvent::Batch {
            data: CategorizationResult::from_classifications(
                classifications,
                "test-model",
                CategorizationType::Cert,
                usage,
            ),
            progress: Progress::of(processed, total),
            usage,
        }
    }

    fn complete(usage: TokenUsage) -> StreamEvent {
        StreamEvent::Complete {
            total_tokens_global: Some(usage),
        }
    }

    #[tokio::test]
    async fn test_accumulates_batches_and_usage() {
        let usage = TokenUsage::new(100, 20, 120);
        let mut stream = EventStream::from_events(vec![
            StreamEvent::Init {
                total: 4,
                batch_size: 2,
            },
            batch_event(
                vec![classification("a", "Scan"), classification("b", "DoS")],
                2,
                4,
                usage,
            ),
            batch_event(
                vec![classification("c", "Scan"), classification("d", "Web")],
                4,
                4,
                usage,
            ),
            complete(TokenUsage::new(200, 40, 240)),
        ]);

        let mut progress_lines = Vec::new();
        let consumer = CategorizationConsumer::new(Taxonomy::Cert, 4);
        let consumed = consumer
            .consume(&mut stream, &CancellationToken::new(), |pct, text| {
                progress_lines.push((pct, text));
            })
            .await
            .unwrap();

        assert_eq!(consumed.result.classifications.len(), 4);
        assert_eq!(consumed.result.total_incidents, 4);
        assert_eq!(consumed.accumulated_usage.total_tokens, 240);
        assert_eq!(consumed.result.usage.total_tokens, 240);
        assert_eq!(
            progress_lines,
            vec![
                (50, "Categorizing with CERT: 2 of 4".to_string()),
                (100, "Categorizing with CERT: 4 of 4".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let usage = TokenUsage::new(10, 5, 15);
        let batch = batch_event(
            vec![classification("a", "Scan"), classification("b", "DoS")],
            2,
            2,
            usage,
        );
        let mut stream = EventStream::from_events(vec![
            StreamEvent::Init {
                total: 2,
                batch_size: 10,
            },
            batch.clone(),
            batch,
            complete(TokenUsage::new(20, 10, 30)),
        ]);

        let consumer = CategorizationConsumer::new(Taxonomy::Cert, 2);
        let consumed = consumer
            .consume(&mut stream, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap();

        // Same ids delivered twice accumulate once; usage still sums per event.
        assert_eq!(consumed.result.classifications.len(), 2);
        assert_eq!(consumed.accumulated_usage.total_tokens, 30);
    }

    #[tokio::test]
    async fn test_error_event_is_raised() {
        let mut stream = EventStream::from_events(vec![
            StreamEvent::Init {
                total: 2,
                batch_size: 10,
            },
            StreamEvent::Error {
                message: "engine exploded".to_string(),
            },
        ]);

        let consumer = CategorizationConsumer::new(Taxonomy::Llm, 2);
        let err = consumer
            .consume(&mut stream, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::Stream(m) if m.contains("exploded")));
    }

    #[tokio::test]
    async fn test_cancellation_stops_processing() {
        let usage = TokenUsage::new(10, 5, 15);
        let mut stream = EventStream::from_events(vec![
            StreamEvent::Init {
                total: 2,
                batch_size: 10,
            },
            batch_event(vec![classification("a", "Scan")], 1, 2, usage),
            complete(usage),
        ]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut progressed = false;
        let consumer = CategorizationConsumer::new(Taxonomy::Cert, 2);
        let err = consumer
            .consume(&mut stream, &cancel, |_, _| progressed = true)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::Cancelled));
        assert!(!progressed);
    }

    #[tokio::test]
    async fn test_empty_stream_completes_with_empty_result() {
        let mut stream = EventStream::from_events(vec![
            StreamEvent::Init {
                total: 0,
                batch_size: 10,
            },
            complete(TokenUsage::default()),
        ]);

        let consumer = CategorizationConsumer::new(Taxonomy::Nist, 0);
        let consumed = consumer
            .consume(&mut stream, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap();
        assert!(consumed.result.classifications.is_empty());
        assert!(consumed.accumulated_usage.is_zero());
    }

    #[tokio::test]
    async fn test_truncated_stream_is_incomplete() {
        let mut stream = EventStream::from_events(vec![StreamEvent::Init {
            total: 2,
            batch_size: 10,
        }]);

        let consumer = CategorizationConsumer::new(Taxonomy::Cert, 2);
        let err = consumer
            .consume(&mut stream, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumeError::Incomplete));
    }
}
