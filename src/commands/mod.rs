//! CLI command handlers

pub mod characters;
pub mod chat;
pub mod chats;
pub mod models;
