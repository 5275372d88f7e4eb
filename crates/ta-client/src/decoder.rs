//! SSE frame decoder.
//!
//! Turns raw transport bytes into typed [`StreamEvent`]s. The decoder is
//! tolerant of partial reads: bytes accumulate in an internal buffer and
//! only complete frames (terminated by a blank line) are decoded; a trailing
//! partial frame stays buffered for the next push.

use tracing::warn;

use ta_core::StreamEvent;

const DATA_PREFIX: &[u8] = b"data: ";
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Incremental decoder for `data: <json>\n\n` frames.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every event completed by them.
    ///
    /// Frames that are not `data:` lines are ignored; frames whose payload
    /// fails to parse are logged and skipped without aborting the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = find_delimiter(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..end];
            if let Some(event) = decode_frame(frame) {
                events.push(event);
            }
        }
        events
    }

    /// Bytes still buffered as an incomplete frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
}

fn decode_frame(frame: &[u8]) -> Option<StreamEvent> {
    if !frame.starts_with(DATA_PREFIX) {
        return None;
    }
    let payload = &frame[DATA_PREFIX.len()..];
    match serde_json::from_slice::<StreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Skipping undecodable stream frame");
            None
        }
    }
}
