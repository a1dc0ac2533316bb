//! Chat list and deletion commands

use crate::api::ApiClient;
use crate::cli::ChatsCommand;
use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, Utc};
use prettytable::{row, Table};

/// Handles `weft chats <subcommand>`
pub async fn handle(config: Config, command: ChatsCommand) -> Result<()> {
    let api = ApiClient::new(&config.api.base_url)?;
    match command {
        ChatsCommand::List { limit } => list_chats(&api, limit).await,
        ChatsCommand::Delete { id } => delete_chat(&api, &id).await,
    }
}

async fn list_chats(api: &ApiClient, limit: usize) -> Result<()> {
    let chats = api.get_chats(limit).await?;
    if chats.is_empty() {
        println!("No chats.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["CHAT ID", "UPDATED", "PREVIEW"]);
    for chat in &chats {
        table.add_row(row![
            chat.chat_id,
            format_timestamp(chat.timestamp_updated),
            truncate(&chat.preview, 60)
        ]);
    }
    table.printstd();
    Ok(())
}

async fn delete_chat(api: &ApiClient, id: &str) -> Result<()> {
    api.delete_chat(id).await?;
    println!("Deleted chat {}", id);
    Ok(())
}

/// Renders an epoch-seconds timestamp for list display
pub(crate) fn format_timestamp(epoch_seconds: f64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_seconds as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Truncates preview text to a maximum width, adding ellipsis
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        truncated.push_str("...");
        truncated
    }
}
