//! Command-line interface definition for Weft
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, chat management, model
//! listing, and character management.

use clap::{Parser, Subcommand};

/// Weft - terminal chat client with branching conversations
///
/// Talk to a streaming generation backend, branch and regenerate
/// responses, and manage reusable characters.
#[derive(Parser, Debug, Clone)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the backend base URL from config
    #[arg(long, env = "WEFT_API_BASE")]
    pub api_base: Option<String>,

    /// Override the model from config
    #[arg(short, long)]
    pub model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Weft
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Chat id to resume instead of the last opened chat
        #[arg(short, long)]
        resume: Option<String>,

        /// Character id applied to the session
        #[arg(long)]
        character: Option<String>,
    },

    /// Manage chats stored on the backend
    Chats {
        /// Chat management subcommand
        #[command(subcommand)]
        command: ChatsCommand,
    },

    /// Inspect available models
    Models {
        /// Model subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Manage characters (reusable system prompts)
    Characters {
        /// Character management subcommand
        #[command(subcommand)]
        command: CharacterCommand,
    },
}

/// Chat management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatsCommand {
    /// List chats, most recently updated first
    List {
        /// Maximum number of chats to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete a chat and all its messages
    Delete {
        /// Chat id to delete
        id: String,
    },
}

/// Model subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List models the backend exposes
    List,
}

/// Character management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CharacterCommand {
    /// List characters
    List,

    /// Show one character including its system prompt
    Show {
        /// Character id
        id: String,
    },

    /// Create a new character
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// System prompt text
        #[arg(short, long)]
        prompt: String,
    },

    /// Update an existing character
    Update {
        /// Character id
        id: String,

        /// New display name
        #[arg(short, long)]
        name: Option<String>,

        /// New system prompt text
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Delete a character
    Delete {
        /// Character id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
