//! Conversation core
//!
//! The branching conversation tree, the streaming session state machine,
//! and the controller that keeps both synchronized with the backend.

pub mod controller;
pub mod message;
pub mod stream;
pub mod tree;

pub use controller::{ChatSessionController, StreamEnd};
pub use message::{now_timestamp, Attachment, AttachmentKind, Message, Role};
pub use stream::{GenerationKind, SaveRoute, SessionOutcome, SessionState, StreamingSession};
pub use tree::{BranchInfo, ConversationTree};
