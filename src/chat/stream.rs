//! Streaming generation sessions
//!
//! A [`StreamingSession`] drives exactly one cancellable generation stream
//! from the backend: it decodes frames, accumulates text, reports progress
//! through a chunk callback, and resolves into a single outcome. The
//! cancellation/partial-save contract is uniform across new generations,
//! continuations, and regenerations; which partial-save endpoint a
//! cancelled session's text routes to is a direct function of the
//! [`GenerationKind`], decided here so the controller cannot mis-route it.

use crate::api::sse::{SseDecoder, StreamEvent};
use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Marker appended to the accumulator when a frame fails to decode
const DECODE_ERROR_MARKER: &str = " [decode error] ";

/// The kind of generation a session performs
///
/// Carries exactly the ids needed to reconcile a partial result on
/// cancellation; exhaustively matched wherever save routing occurs, so an
/// invalid or missing-field context cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationKind {
    /// Generate a new assistant message under `parent_id`
    New {
        /// Parent of the message being generated; `None` in an empty chat
        parent_id: Option<String>,
    },
    /// Append to an existing assistant message
    Continue {
        /// Message being extended
        message_id: String,
        /// Its content before the continuation started
        original: String,
    },
    /// Regenerate an existing assistant message
    Regenerate {
        /// Message being regenerated
        message_id: String,
        /// Its parent, target of branch creation
        parent_id: String,
        /// Create a sibling branch instead of overwriting
        new_branch: bool,
    },
}

/// Where a cancelled session's partial text must be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveRoute {
    /// `save_generation_result/{parent_id}`: new message under a parent
    NewMessage {
        /// Parent to attach the saved message to
        parent_id: String,
    },
    /// `save_edit_result/{message_id}`: replacement of an existing message
    ReplaceMessage {
        /// Message to overwrite
        message_id: String,
    },
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet driving a stream
    Idle,
    /// Actively consuming frames
    Streaming,
    /// Terminal: stream finished with the `[DONE]` sentinel
    Completed,
    /// Terminal: cancelled locally or by a backend status frame
    Cancelled,
    /// Terminal: backend error frame or transport failure
    Failed,
}

/// How a driven session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Stream completed normally
    Completed {
        /// Confirmed message id from the terminal frame, when present.
        /// The caller reloads regardless; the fresh fetch is ground truth.
        message_id: Option<String>,
    },
    /// Cancelled before completion; partial text may need saving
    Cancelled,
    /// Backend error or transport failure
    Failed(String),
}

/// One cancellable generation stream
pub struct StreamingSession {
    kind: GenerationKind,
    cancel: CancellationToken,
    accumulated: String,
    state: SessionState,
}

impl StreamingSession {
    /// Creates a session for the given generation kind
    ///
    /// A continuation seeds the accumulator with the target's existing
    /// content so the unchanged-content check and the partial save both
    /// operate on the full text the user sees.
    pub fn new(kind: GenerationKind, cancel: CancellationToken) -> Self {
        let accumulated = match &kind {
            GenerationKind::Continue { original, .. } => original.clone(),
            _ => String::new(),
        };
        Self {
            kind,
            cancel,
            accumulated,
            state: SessionState::Idle,
        }
    }

    /// The generation kind this session was started for
    pub fn kind(&self) -> &GenerationKind {
        &self.kind
    }

    /// Text accumulated so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Requests cooperative cancellation
    ///
    /// Observed before the next frame read; never preemptive.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Consumes the stream until a terminal event
    ///
    /// `on_text` receives the full accumulated text after every content
    /// frame (and after an inline decode-error annotation). Cancellation
    /// is checked before each read, so a pre-cancelled token consumes zero
    /// frames. Frame decode errors are annotated and non-fatal; error
    /// frames and transport errors end the session as failed.
    pub async fn drive<S, E>(
        &mut self,
        mut frames: SseDecoder<S>,
        mut on_text: impl FnMut(&str),
    ) -> SessionOutcome
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        self.state = SessionState::Streaming;
        let cancel = self.cancel.clone();
        let mut confirmed_id: Option<String> = None;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Generation cancelled locally");
                    break SessionOutcome::Cancelled;
                }
                event = frames.next_event() => match event {
                    Some(Ok(StreamEvent::Content(delta))) => {
                        self.accumulated.push_str(&delta);
                        on_text(&self.accumulated);
                    }
                    Some(Ok(StreamEvent::Malformed(detail))) => {
                        warn!("Annotating malformed frame: {}", detail);
                        self.accumulated.push_str(DECODE_ERROR_MARKER);
                        on_text(&self.accumulated);
                    }
                    Some(Ok(StreamEvent::Error(message))) => {
                        break SessionOutcome::Failed(message);
                    }
                    Some(Ok(StreamEvent::Cancelled)) => {
                        debug!("Backend reported generation cancelled");
                        break SessionOutcome::Cancelled;
                    }
                    Some(Ok(StreamEvent::Complete { message_id })) => {
                        confirmed_id = message_id;
                    }
                    Some(Ok(StreamEvent::Done)) => {
                        break SessionOutcome::Completed {
                            message_id: confirmed_id.take(),
                        };
                    }
                    Some(Err(e)) => {
                        break SessionOutcome::Failed(e.to_string());
                    }
                    None => {
                        break SessionOutcome::Failed(
                            "stream ended before [DONE]".to_string(),
                        );
                    }
                }
            }
        };

        self.state = match &outcome {
            SessionOutcome::Completed { .. } => SessionState::Completed,
            SessionOutcome::Cancelled => SessionState::Cancelled,
            SessionOutcome::Failed(_) => SessionState::Failed,
        };
        outcome
    }

    /// The partial text a cancelled session must persist, if any
    ///
    /// `None` when there is nothing worth saving: an empty accumulator, a
    /// continuation whose text never changed (needless-write avoidance),
    /// or a new generation that never resolved a parent to attach to.
    /// Otherwise returns the save route and the text.
    pub fn partial_save(&self) -> Option<(SaveRoute, &str)> {
        if self.accumulated.is_empty() {
            return None;
        }
        match &self.kind {
            GenerationKind::New { parent_id } => {
                let parent_id = parent_id.clone()?;
                Some((SaveRoute::NewMessage { parent_id }, &self.accumulated))
            }
            GenerationKind::Continue {
                message_id,
                original,
            } => {
                if self.accumulated == *original {
                    return None;
                }
                Some((
                    SaveRoute::ReplaceMessage {
                        message_id: message_id.clone(),
                    },
                    &self.accumulated,
                ))
            }
            GenerationKind::Regenerate {
                message_id,
                parent_id,
                new_branch,
            } => {
                let route = if *new_branch {
                    SaveRoute::NewMessage {
                        parent_id: parent_id.clone(),
                    }
                } else {
                    SaveRoute::ReplaceMessage {
                        message_id: message_id.clone(),
                    }
                };
                Some((route, &self.accumulated))
            }
        }
    }
}
