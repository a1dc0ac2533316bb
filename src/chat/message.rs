//! Domain message model
//!
//! Messages are nodes in the conversation tree. The backend assigns every
//! id; the one exception is the transient placeholder an in-progress
//! generation renders under until the confirming reload replaces it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of client-local placeholder identifiers
const PLACEHOLDER_PREFIX: &str = "pending-";

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the user
    User,
    /// Message generated by the backend
    Assistant,
    /// Configuration, not conversation; excluded from the tree entirely
    System,
}

impl Role {
    /// Parses a wire role string
    ///
    /// Returns `None` for roles outside the closed set; callers drop such
    /// messages with a warning rather than guessing.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Wire representation of the role
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Kind of an attachment payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Inline image (base64 payload)
    Image,
    /// Opaque file payload
    File,
}

/// Attachment carried by a message
///
/// Payloads are opaque to the client; they are forwarded to the backend
/// verbatim and echoed back on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Payload kind
    pub kind: AttachmentKind,
    /// Raw payload (base64 for images)
    pub payload: String,
}

/// A node in the conversation tree
///
/// Child lists are derived by [`crate::chat::ConversationTree`], not
/// stored here; `active_child_index` is the per-node branch pointer the
/// backend persists, clamped during traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Backend-assigned id, or a transient `pending-` placeholder id
    pub id: String,
    /// Sender role
    pub role: Role,
    /// Parent message id; `None` for roots
    pub parent_id: Option<String>,
    /// Raw markdown source
    pub content: String,
    /// Ordered attachments
    pub attachments: Vec<Attachment>,
    /// Index into the derived, timestamp-sorted child list
    pub active_child_index: usize,
    /// Backend timestamp (epoch seconds); orders siblings stably
    pub timestamp: f64,
    /// Model that produced this message, when the backend recorded one
    pub model: Option<String>,
}

impl Message {
    /// Creates a user message with a backend-confirmed id
    ///
    /// Used for the optimistic send-append: the id is already confirmed,
    /// only the position in the tree is local until the next reload.
    pub fn user(
        id: impl Into<String>,
        parent_id: Option<String>,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
        timestamp: f64,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            parent_id,
            content: content.into(),
            attachments,
            active_child_index: 0,
            timestamp,
            model: None,
        }
    }

    /// Creates a transient placeholder assistant message
    ///
    /// Rendered while a generation streams; replaced by the confirmed
    /// message when the chat reloads.
    pub fn placeholder(parent_id: Option<String>, timestamp: f64) -> Self {
        Self {
            id: format!("{}{}", PLACEHOLDER_PREFIX, Uuid::new_v4()),
            role: Role::Assistant,
            parent_id,
            content: String::new(),
            attachments: Vec::new(),
            active_child_index: 0,
            timestamp,
            model: None,
        }
    }

    /// Whether this message carries a client-local placeholder id
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }
}

/// Current epoch time as fractional seconds
///
/// Timestamps for optimistic appends; confirmed timestamps always come
/// from the backend on reload.
pub fn now_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
