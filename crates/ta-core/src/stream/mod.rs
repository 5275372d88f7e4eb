//! Categorization stream protocol.
//!
//! The categorization pipeline is exposed as a Server-Sent-Events stream of
//! JSON payloads. Each event is one frame of the form `data: <json>\n\n`;
//! frames are never split across writes. A stream's lifecycle is exactly one
//! `init`, zero or more `batch` events with strictly increasing `processed`
//! counts, then one terminal `complete` or `error`.

mod producer;

pub use producer::{BatchCategorizer, DEFAULT_BATCH_SIZE};

use serde::{Deserialize, Serialize};

use crate::classification::CategorizationResult;
use crate::usage::TokenUsage;

/// Progress of a running categorization stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Incidents handed to the engine so far (input count, not survivors).
    pub processed: usize,
    /// Total incidents in the stream.
    pub total: usize,
    /// `round(processed / total * 100)`, 100 for an empty stream.
    pub percentage: u32,
}

impl Progress {
    /// Computes progress for `processed` out of `total` incidents.
    pub fn of(processed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((processed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            processed,
            total,
            percentage,
        }
    }
}

/// One decoded frame of the categorization stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Stream opened; announces the workload shape.
    #[serde(rename_all = "camelCase")]
    Init { total: usize, batch_size: usize },
    /// One processed batch with its validated result and own token usage.
    Batch {
        data: CategorizationResult,
        progress: Progress,
        usage: TokenUsage,
    },
    /// Terminal success, carrying the cumulative usage of the whole stream.
    #[serde(rename_all = "camelCase")]
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        total_tokens_global: Option<TokenUsage>,
    },
    /// Terminal failure.
    Error { message: String },
}

impl StreamEvent {
    /// Serializes this event as one SSE frame (`data: <json>\n\n`).
    pub fn to_sse_frame(&self) -> String {
        // StreamEvent serialization cannot fail: all fields are plain data.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {}\n\n", json)
    }

    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::CategorizationType;

    #[test]
    fn test_progress_rounding() {
        assert_eq!(Progress::of(10, 25).percentage, 40);
        assert_eq!(Progress::of(20, 25).percentage, 80);
        assert_eq!(Progress::of(25, 25).percentage, 100);
        assert_eq!(Progress::of(1, 3).percentage, 33);
        assert_eq!(Progress::of(0, 0).percentage, 100);
    }

    #[test]
    fn test_init_frame_shape() {
        let frame = StreamEvent::Init {
            total: 25,
            batch_size: 10,
        }
        .to_sse_frame();
        assert_eq!(frame, "data: {\"type\":\"init\",\"total\":25,\"batchSize\":10}\n\n");
    }

    #[test]
    fn test_complete_event_round_trip() {
        let event = StreamEvent::Complete {
            total_tokens_global: Some(TokenUsage::new(10, 5, 15)),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"totalTokensGlobal\""));
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_batch_event_round_trip() {
        let event = StreamEvent::Batch {
            data: CategorizationResult::empty("m", CategorizationType::Cert),
            progress: Progress::of(10, 25),
            usage: TokenUsage::new(1, 2, 3),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_terminal_detection() {
        assert!(StreamEvent::Error {
            message: "boom".to_string()
        }
        .is_terminal());
        assert!(!StreamEvent::Init {
            total: 0,
            batch_size: 10
        }
        .is_terminal());
    }
}
