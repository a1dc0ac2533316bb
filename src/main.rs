//! Weft - terminal chat client
//!
//! Main entry point: initializes tracing, loads configuration, and
//! dispatches to the command handlers.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weft::cli::{Cli, Commands};
use weft::commands;
use weft::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first so --verbose can shape logging
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command.clone() {
        Commands::Chat { resume, character } => {
            tracing::info!("Starting interactive chat");
            commands::chat::run_chat(config, resume, character).await
        }
        Commands::Chats { command } => commands::chats::handle(config, command).await,
        Commands::Models { command } => commands::models::handle(config, command).await,
        Commands::Characters { command } => commands::characters::handle(config, command).await,
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "weft=debug" } else { "weft=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
