// ReqLab
// Main entry point for the reqlab binary

use clap::Parser;
use reqlab_engine::cli::{Cli, Command, ConfigAction, KeyAction};
use reqlab_engine::config::Config;
use reqlab_engine::handlers::{
    handle_agents, handle_chat, handle_config_show, handle_extract, handle_key_set,
    handle_key_status, OutputFormat,
};
use reqlab_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log beats the config file; RUST_LOG beats both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("ReqLab v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Handle commands
    match cli.command {
        Command::Chat { session, no_stream } => {
            tracing::info!("Starting group chat...");
            handle_chat(session, no_stream, &config).await
        }

        Command::Extract { file, session } => {
            tracing::info!("Extracting artifacts from {}", file.display());
            handle_extract(&file, &session, &config, format).await
        }

        Command::Agents => handle_agents(&config, format).await,

        Command::Config { action } => {
            tracing::info!("Config management: {:?}", action);
            match action {
                ConfigAction::Show => handle_config_show(&config, format).await,
            }
        }

        Command::Key { action } => match action {
            KeyAction::Set { name } => handle_key_set(&name).await,
            KeyAction::Status => handle_key_status(format).await,
        },
    }
}
