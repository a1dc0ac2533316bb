//! Weft - terminal chat client library
//!
//! Weft talks to a remote generation backend that owns all persistent
//! state (chats, messages, branches, characters) and keeps a local view of
//! one chat synchronized with it across interruptible streaming
//! operations.
//!
//! # Architecture
//!
//! - `chat`: the conversation tree, streaming sessions, and the session
//!   controller that orchestrates them against the backend
//! - `api`: wire types, the SSE frame decoder, and the HTTP client
//! - `commands`: CLI command handlers, including the interactive REPL
//! - `config`: configuration management and validation
//! - `prefs`: persisted client-local preferences
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use weft::api::ApiClient;
//! use weft::chat::ChatSessionController;
//! use weft::config::Config;
//! use weft::prefs::Prefs;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let api = ApiClient::new(&config.api.base_url)?;
//!     let mut controller = ChatSessionController::new(api, &config, &Prefs::default());
//!
//!     controller.refresh_chats().await?;
//!     let mut on_text = |_text: &str| {};
//!     controller.send_message("Hello!", Vec::new(), &mut on_text).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod prefs;

// Re-export commonly used types
pub use api::ApiClient;
pub use chat::{ChatSessionController, ConversationTree, Message, Role, StreamEnd};
pub use config::Config;
pub use error::{Result, WeftError};

#[cfg(test)]
pub mod test_utils;
