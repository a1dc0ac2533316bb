//! Test utilities for Weft
//!
//! Message builders and fixtures shared by unit tests.

use crate::chat::message::{Message, Role};

/// Builds a user message for tree tests
pub fn user_msg(id: &str, parent: Option<&str>, timestamp: f64) -> Message {
    Message {
        id: id.to_string(),
        role: Role::User,
        parent_id: parent.map(str::to_string),
        content: format!("user message {}", id),
        attachments: Vec::new(),
        active_child_index: 0,
        timestamp,
        model: None,
    }
}

/// Builds an assistant message for tree tests
pub fn assistant_msg(id: &str, parent: Option<&str>, timestamp: f64) -> Message {
    Message {
        id: id.to_string(),
        role: Role::Assistant,
        parent_id: parent.map(str::to_string),
        content: format!("assistant message {}", id),
        attachments: Vec::new(),
        active_child_index: 0,
        timestamp,
        model: None,
    }
}

/// Builds a system message for tree tests
pub fn system_msg(id: &str, timestamp: f64) -> Message {
    Message {
        id: id.to_string(),
        role: Role::System,
        parent_id: None,
        content: "system prompt".to_string(),
        attachments: Vec::new(),
        active_child_index: 0,
        timestamp,
        model: None,
    }
}
