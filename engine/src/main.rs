// Flightdesk flight assistant
// Main entry point for the flightdesk binary

use clap::Parser;
use flightdesk_engine::cli::{Cli, Command};
use flightdesk_engine::config::Config;
use flightdesk_engine::handlers::{
    handle_ask_command, handle_chat, handle_config, handle_flights,
};
use flightdesk_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (file if given, then environment overrides)
    let config = Config::load(cli.config.as_deref())?;

    // --log wins over the configured level; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Flightdesk v{} ({} - {})", version, commit, timestamp);

    // Handle commands
    match cli.command {
        Command::Ask { source, question } => {
            tracing::info!("Asking about {}", source.airport);
            handle_ask_command(config, source, question).await
        }

        Command::Chat { source } => {
            tracing::info!("Starting chat for {}", source.airport);
            handle_chat(config, source).await
        }

        Command::Flights { source } => {
            tracing::info!("Fetching today's flights for {}", source.airport);
            handle_flights(config, source).await
        }

        Command::Config => handle_config(&config),
    }
}
