//! Typed event stream over a raw SSE transport.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

use ta_core::StreamEvent;

use crate::api_client::ClientError;
use crate::decoder::SseDecoder;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// A finite, non-restartable sequence of [`StreamEvent`]s decoded from a
/// byte transport. To retry a categorization, open a new stream.
pub struct EventStream {
    transport: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl EventStream {
    /// Wraps a raw byte stream.
    pub fn new<S>(transport: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        Self {
            transport: Box::pin(transport),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Builds a stream that replays pre-framed events. Test helper for
    /// scripted backends.
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let frames: Vec<Result<Bytes, ClientError>> = events
            .into_iter()
            .map(|event| Ok(Bytes::from(event.to_sse_frame())))
            .collect();
        Self::new(stream::iter(frames))
    }

    /// Returns the next decoded event, or `None` once the transport closes.
    ///
    /// A transport failure mid-stream surfaces as an error; decode failures
    /// of individual frames are skipped inside the decoder.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ClientError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            match self.transport.next().await {
                Some(Ok(chunk)) => {
                    self.pending.extend(self.decoder.push(&chunk));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                None => {
                    self.finished = true;
                }
            }
        }
    }
}
