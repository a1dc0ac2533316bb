//! SSE decoding for generation streams
//!
//! The generation endpoints respond with Server-Sent-Events-style bodies:
//! one `data: <json>` line per frame, terminated by the literal
//! `data: [DONE]`. This module turns a raw byte stream into a sequence of
//! [`StreamEvent`]s, tolerating chunk boundaries that split lines,
//! comment lines, and malformed frames (which surface as events rather
//! than ending the stream).

use crate::api::types::StreamFrame;
use crate::error::{Result, WeftError};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

/// Keep-alive content token one upstream provider emits while a request
/// is queued. It is not generated text and never reaches the accumulator.
pub const KEEP_ALIVE_TOKEN: &str = "OPENROUTER PROCESSING";

/// One decoded event from a generation stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Content delta to append to the accumulator
    Content(String),
    /// A frame that failed to decode; non-fatal
    Malformed(String),
    /// Error reported by the backend; ends the session as failed
    Error(String),
    /// Backend confirmed it stopped generating
    Cancelled,
    /// Terminal frame of a successful generation
    Complete {
        /// Confirmed id of the generated message, when supplied
        message_id: Option<String>,
    },
    /// The `[DONE]` sentinel
    Done,
}

/// Incremental SSE decoder over a byte stream
///
/// Generic over the underlying stream so unit tests can feed hand-built
/// chunk sequences; production code wraps `reqwest`'s body stream.
pub struct SseDecoder<S> {
    inner: S,
    buf: BytesMut,
    exhausted: bool,
}

impl<S, E> SseDecoder<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    /// Wraps a byte stream
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            exhausted: false,
        }
    }

    /// Decodes the next event
    ///
    /// Returns `None` when the underlying stream is exhausted. Transport
    /// errors are returned as `Err` and end the stream; malformed frames
    /// are returned as `Ok(StreamEvent::Malformed)` and do not.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        loop {
            if let Some(line) = self.take_line() {
                if let Some(event) = parse_line(&line) {
                    return Some(Ok(event));
                }
                continue;
            }

            if self.exhausted {
                // Flush a final unterminated line, if any
                if self.buf.is_empty() {
                    return None;
                }
                let line = String::from_utf8_lossy(&self.buf.split()).into_owned();
                if let Some(event) = parse_line(&line) {
                    return Some(Ok(event));
                }
                return None;
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(WeftError::Stream(e.to_string()).into()));
                }
                None => self.exhausted = true,
            }
        }
    }

    /// Splits one newline-terminated line off the buffer
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line = self.buf.split_to(pos + 1);
        Some(String::from_utf8_lossy(&line[..pos]).into_owned())
    }
}

/// Parses one line into an event
///
/// Returns `None` for lines that carry no event: blanks, SSE comments,
/// non-data fields, and frames with nothing actionable in them.
fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload == "[DONE]" {
        return Some(StreamEvent::Done);
    }
    match serde_json::from_str::<StreamFrame>(payload) {
        Ok(frame) => frame_to_event(frame),
        Err(e) => {
            tracing::warn!("Malformed stream frame: {}", e);
            Some(StreamEvent::Malformed(e.to_string()))
        }
    }
}

/// Maps a decoded frame onto an event
fn frame_to_event(frame: StreamFrame) -> Option<StreamEvent> {
    if let Some(error) = frame.error {
        return Some(StreamEvent::Error(error));
    }
    if frame.status.as_deref() == Some("cancelled") {
        return Some(StreamEvent::Cancelled);
    }
    if frame.complete.unwrap_or(false) {
        return Some(StreamEvent::Complete {
            message_id: frame.message_id,
        });
    }
    match frame.content {
        Some(content) if content == KEEP_ALIVE_TOKEN => None,
        Some(content) if !content.is_empty() => Some(StreamEvent::Content(content)),
        _ => None,
    }
}
