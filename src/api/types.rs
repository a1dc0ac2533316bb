//! Wire types for the chat backend API
//!
//! Request and response structures for every backend endpoint, plus the
//! conversion from wire messages into the domain model. Field names track
//! the backend's JSON exactly; the domain layer never sees wire shapes.

use crate::chat::{Attachment, AttachmentKind, Message, Role};
use serde::{Deserialize, Serialize};

/// Model catalog entry from `GET /models`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    /// Model identifier sent back in generate requests
    pub name: String,
    /// User-friendly display name
    #[serde(default)]
    pub display_name: String,
    /// Whether the model accepts image attachments
    #[serde(default)]
    pub supports_images: bool,
    /// Upstream provider the backend routes this model to
    #[serde(default)]
    pub provider: Option<String>,
}

/// Chat list entry from `GET /chat/get_chats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Chat id
    pub chat_id: String,
    /// Preview text for list display
    #[serde(default)]
    pub preview: String,
    /// Last update time (epoch seconds)
    #[serde(default)]
    pub timestamp_updated: f64,
}

/// Attachment wire shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAttachment {
    /// "image" or "file"
    pub kind: String,
    /// Raw payload (base64 for images)
    pub payload: String,
}

impl From<Attachment> for ApiAttachment {
    fn from(a: Attachment) -> Self {
        Self {
            kind: match a.kind {
                AttachmentKind::Image => "image".to_string(),
                AttachmentKind::File => "file".to_string(),
            },
            payload: a.payload,
        }
    }
}

impl ApiAttachment {
    fn into_domain(self) -> Attachment {
        let kind = match self.kind.as_str() {
            "image" => AttachmentKind::Image,
            _ => AttachmentKind::File,
        };
        Attachment {
            kind,
            payload: self.payload,
        }
    }
}

/// Message wire shape inside `GET /chat/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Backend-assigned message id
    pub message_id: String,
    /// Role string ("user" | "assistant" | "system")
    pub role: String,
    /// Parent message id, absent for roots
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Message content (markdown source)
    #[serde(default)]
    pub message: String,
    /// Ordered attachments
    #[serde(default)]
    pub attachments: Vec<ApiAttachment>,
    /// Persisted branch selection for this node's children
    #[serde(default)]
    pub active_child_index: usize,
    /// Creation time (epoch seconds)
    #[serde(default)]
    pub timestamp: f64,
    /// Model that produced the message
    #[serde(default)]
    pub model_name: Option<String>,
}

impl ApiMessage {
    /// Converts a wire message into the domain model
    ///
    /// Returns `None` for roles outside the closed set; such messages are
    /// dropped with a warning rather than rendered with a guessed role.
    pub fn into_domain(self) -> Option<Message> {
        let Some(role) = Role::from_wire(&self.role) else {
            tracing::warn!(
                "Dropping message {} with unknown role {:?}",
                self.message_id,
                self.role
            );
            return None;
        };
        Some(Message {
            id: self.message_id,
            role,
            parent_id: self.parent_id,
            content: self.message,
            attachments: self.attachments.into_iter().map(ApiAttachment::into_domain).collect(),
            active_child_index: self.active_child_index,
            timestamp: self.timestamp,
            model: self.model_name,
        })
    }
}

/// Payload of `GET /chat/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Flat, unordered message list
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    /// Active character, if any
    #[serde(default)]
    pub character_id: Option<String>,
}

impl ChatPayload {
    /// Converts the flat wire list into domain messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
            .into_iter()
            .filter_map(ApiMessage::into_domain)
            .collect()
    }
}

/// Body of `POST /chat/new_chat`
#[derive(Debug, Clone, Serialize)]
pub struct NewChatRequest {
    /// First user message
    pub message: String,
    /// Attachments on the first message
    pub attachments: Vec<ApiAttachment>,
    /// Character applied to the new chat
    pub character_id: Option<String>,
}

/// Response of `POST /chat/new_chat`
#[derive(Debug, Clone, Deserialize)]
pub struct NewChatResponse {
    /// Backend-assigned chat id
    pub chat_id: String,
}

/// Body of `POST /chat/{id}/add_message`
#[derive(Debug, Clone, Serialize)]
pub struct AddMessageRequest {
    /// Message content
    pub message: String,
    /// Role string
    pub role: String,
    /// Attachments
    pub attachments: Vec<ApiAttachment>,
}

/// Response of `POST /chat/{id}/add_message`
#[derive(Debug, Clone, Deserialize)]
pub struct AddMessageResponse {
    /// Backend-assigned message id
    pub message_id: String,
}

/// Body of `POST /chat/{id}/generate/` and `POST /chat/{id}/continue/{messageId}`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model to generate with
    pub model_name: String,
    /// Always true; the client only consumes streamed responses
    pub streaming: bool,
    /// Generation arguments forwarded verbatim
    pub gen_args: crate::config::GenerationConfig,
    /// Optional upstream provider hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Body of `POST /chat/{id}/regenerate/{messageId}`
#[derive(Debug, Clone, Serialize)]
pub struct RegenerateRequest {
    /// Common generation fields
    #[serde(flatten)]
    pub generate: GenerateRequest,
    /// Whether to create a sibling branch instead of overwriting
    pub new_branch: bool,
}

/// Body of the partial-save endpoints
#[derive(Debug, Clone, Serialize)]
pub struct SaveResultRequest {
    /// Accumulated text to persist
    pub message: String,
}

/// Body of `POST /chat/{id}/set_active_branch/{parentId}`
#[derive(Debug, Clone, Serialize)]
pub struct SetActiveBranchRequest {
    /// New index into the parent's child list
    pub child_index: usize,
}

/// Body of `POST /chat/{id}/edit_message/{messageId}`
#[derive(Debug, Clone, Serialize)]
pub struct EditMessageRequest {
    /// Full replacement content
    pub message: String,
    /// Preserved role
    pub role: String,
    /// Preserved model
    pub model_name: Option<String>,
    /// Preserved attachments
    pub attachments: Vec<ApiAttachment>,
}

/// Body of `POST /chat/{id}/set_active_character`
#[derive(Debug, Clone, Serialize)]
pub struct SetActiveCharacterRequest {
    /// Character id, or `None` to clear
    pub character_id: Option<String>,
}

/// Character entry for the CRUD endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterEntry {
    /// Character id
    pub character_id: String,
    /// Display name
    pub name: String,
    /// System prompt text
    #[serde(default)]
    pub system_prompt: String,
}

/// Body of `POST /chat/create_character` and `PUT /chat/update_character/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct CharacterUpsertRequest {
    /// Display name
    pub name: String,
    /// System prompt text
    pub system_prompt: String,
}

/// Response of `POST /chat/create_character`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacterResponse {
    /// Backend-assigned character id
    pub character_id: String,
}

/// One decoded generation stream frame
///
/// Every `data:` line of the SSE stream (other than the `[DONE]` sentinel)
/// parses into this shape; all fields are optional and a frame may carry
/// none of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamFrame {
    /// Content delta to append
    #[serde(default)]
    pub content: Option<String>,
    /// Error reported mid-stream; ends the session as failed
    #[serde(default)]
    pub error: Option<String>,
    /// Status marker; "cancelled" means the backend stopped generating
    #[serde(default)]
    pub status: Option<String>,
    /// Present on the terminal frame of a successful generation
    #[serde(default)]
    pub complete: Option<bool>,
    /// Confirmed id of the generated message, when `complete` is set
    #[serde(default)]
    pub message_id: Option<String>,
}
