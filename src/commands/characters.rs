//! Character management commands
//!
//! Characters are reusable system prompts with a lifecycle independent of
//! chats; a chat references one by id.

use crate::api::{ApiClient, CharacterUpsertRequest};
use crate::cli::CharacterCommand;
use crate::config::Config;
use crate::error::{Result, WeftError};
use prettytable::{row, Table};

/// Handles `weft characters <subcommand>`
pub async fn handle(config: Config, command: CharacterCommand) -> Result<()> {
    let api = ApiClient::new(&config.api.base_url)?;
    match command {
        CharacterCommand::List => list(&api).await,
        CharacterCommand::Show { id } => show(&api, &id).await,
        CharacterCommand::Create { name, prompt } => create(&api, name, prompt).await,
        CharacterCommand::Update { id, name, prompt } => update(&api, &id, name, prompt).await,
        CharacterCommand::Delete { id } => delete(&api, &id).await,
    }
}

async fn list(api: &ApiClient) -> Result<()> {
    let characters = api.list_characters().await?;
    if characters.is_empty() {
        println!("No characters.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["CHARACTER ID", "NAME", "SYSTEM PROMPT"]);
    for character in &characters {
        table.add_row(row![
            character.character_id,
            character.name,
            super::chats::truncate(&character.system_prompt, 60)
        ]);
    }
    table.printstd();
    Ok(())
}

async fn show(api: &ApiClient, id: &str) -> Result<()> {
    let character = api.get_character(id).await?;
    println!("{} ({})", character.name, character.character_id);
    println!();
    println!("{}", character.system_prompt);
    Ok(())
}

async fn create(api: &ApiClient, name: String, prompt: String) -> Result<()> {
    let response = api
        .create_character(&CharacterUpsertRequest {
            name,
            system_prompt: prompt,
        })
        .await?;
    println!("Created character {}", response.character_id);
    Ok(())
}

async fn update(
    api: &ApiClient,
    id: &str,
    name: Option<String>,
    prompt: Option<String>,
) -> Result<()> {
    if name.is_none() && prompt.is_none() {
        return Err(
            WeftError::Validation("nothing to update: pass --name and/or --prompt".to_string())
                .into(),
        );
    }
    // The update endpoint replaces the whole record; fetch to preserve
    // whichever field was not supplied.
    let existing = api.get_character(id).await?;
    api.update_character(
        id,
        &CharacterUpsertRequest {
            name: name.unwrap_or(existing.name),
            system_prompt: prompt.unwrap_or(existing.system_prompt),
        },
    )
    .await?;
    println!("Updated character {}", id);
    Ok(())
}

async fn delete(api: &ApiClient, id: &str) -> Result<()> {
    api.delete_character(id).await?;
    println!("Deleted character {}", id);
    Ok(())
}
