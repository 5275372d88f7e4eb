//! Grounded chat stream endpoint.
//!
//! Answers are grounded in the incident corpus: the question is used for a
//! relevance search, the matching incidents become the model context, and
//! the response streams as SSE frames: one metadata frame with the
//! similarity scores, the answer text, then a terminal frame with usage.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use ta_core::TokenUsage;

use crate::dto::ChatRequest;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates chat routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/chat/stream", post(chat_stream))
}

/// One frame of the chat stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ChatStreamEvent {
    #[serde(rename_all = "camelCase")]
    Metadata {
        context_utilization: f32,
        similarity_scores: Vec<SimilarityScore>,
    },
    Text {
        delta: String,
    },
    Complete {
        usage: TokenUsage,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimilarityScore {
    document_id: String,
    similarity: f32,
}

/// Streams a grounded answer to the latest user message.
async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let prompt = request
        .messages
        .last()
        .map(|m| m.content.clone())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("a prompt message is required".to_string()))?;

    let (tx, rx) = mpsc::channel::<ChatStreamEvent>(8);
    let index = Arc::clone(&state.index);
    let chat = Arc::clone(&state.chat);

    tokio::spawn(async move {
        let relevant = match index.search_relevant(&prompt).await {
            Ok(relevant) => relevant,
            Err(e) => {
                warn!(error = %e, "Chat grounding search failed");
                let _ = tx
                    .send(ChatStreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        let metadata = ChatStreamEvent::Metadata {
            context_utilization: relevant.first().map(|r| r.score * 100.0).unwrap_or(0.0),
            similarity_scores: relevant
                .iter()
                .map(|r| SimilarityScore {
                    document_id: r.incident.id.clone(),
                    similarity: r.score,
                })
                .collect(),
        };
        if tx.send(metadata).await.is_err() {
            return;
        }

        let context: String = relevant
            .iter()
            .map(|r| r.incident.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        match chat.answer(&prompt, &context).await {
            Ok(output) => {
                if tx
                    .send(ChatStreamEvent::Text { delta: output.text })
                    .await
                    .is_err()
                {
                    return;
                }
                let _ = tx
                    .send(ChatStreamEvent::Complete {
                        usage: output.usage,
                    })
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "Chat generation failed");
                let _ = tx
                    .send(ChatStreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse_event(&event)));
    Ok(Sse::new(stream))
}

fn to_sse_event(event: &ChatStreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(_) => {
            Event::default().data(r#"{"type":"error","message":"event serialization failed"}"#)
        }
    }
}
