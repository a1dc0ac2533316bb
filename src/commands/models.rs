//! Model listing command

use crate::api::ApiClient;
use crate::cli::ModelCommand;
use crate::config::Config;
use crate::error::Result;
use prettytable::{row, Table};

/// Handles `weft models <subcommand>`
pub async fn handle(config: Config, command: ModelCommand) -> Result<()> {
    let api = ApiClient::new(&config.api.base_url)?;
    match command {
        ModelCommand::List => list_models(&api, &config.chat.model).await,
    }
}

async fn list_models(api: &ApiClient, current: &str) -> Result<()> {
    let models = api.list_models().await?;
    if models.is_empty() {
        println!("No models available.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["", "NAME", "DISPLAY NAME", "PROVIDER", "IMAGES"]);
    for model in &models {
        let marker = if model.name == current { "*" } else { "" };
        table.add_row(row![
            marker,
            model.name,
            model.display_name,
            model.provider.as_deref().unwrap_or("-"),
            if model.supports_images { "yes" } else { "no" }
        ]);
    }
    table.printstd();
    Ok(())
}
