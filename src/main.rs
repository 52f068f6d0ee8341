mod config;
mod http_server;
mod logging;
mod ports;
mod providers;
mod services;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    config::Config, http_server::state::AppState, logging::setup_logging,
    providers::build_registry, services::credentials::CredentialStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "MUSIC_AGGREGATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "MUSIC_AGGREGATOR_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// The port to run the server on, overrides the config
        #[arg(short, long, env = "MUSIC_AGGREGATOR_HTTP_PORT")]
        port: Option<u16>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Music aggregator starting");

    match args.command {
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = Config::create_default()?;
                log::info!("Default config at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
        Commands::Serve { port } => {
            log::debug!("Loading configuration");
            let config = {
                if let Some(config) = args.config {
                    Config::from_file(&config)
                } else {
                    Config::load()
                }
            }
            .with_context(|| "Failed to load music-aggregator config")?;

            let credentials = Arc::new(
                CredentialStore::load(config.credentials_path())
                    .wrap_err("Failed to load credentials")?,
            );
            let client = reqwest::Client::builder()
                .build()
                .wrap_err("Failed to build HTTP client")?;
            let registry = build_registry(&config, credentials, &client)?;
            log::info!(
                "Registered sources: {}",
                registry.sources().collect::<Vec<_>>().join(", ")
            );

            let app_state = Arc::new(AppState::new(
                registry,
                client,
                config.fan_out_deadline(),
                config.probe_timeout(),
            ));

            let port = port.unwrap_or(config.server.port);
            log::info!("Starting HTTP server on port: {}", port);
            http_server::app::start(port, app_state).await?;
        }
    }

    Ok(())
}
