//! # Sentiment Console Server Driver
//!
//! ## Purpose
//! Main entry point for the labeling console server. Orchestrates
//! initialization of all components and starts the web server exposing the
//! console API.
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Initialize the record store and the sentiment model
//! 4. Start the web API server
//! 5. Handle shutdown signals gracefully

use clap::{Arg, Command};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use sentiment_console::{
    api::ApiServer,
    config::Config,
    errors::{ConsoleError, Result},
    model::SentimentModel,
    store::RecordStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("sentiment-console-server")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Labeling Platform Team")
        .about("Operator console backend for text sentiment labeling and review")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("write-default-config")
                .long("write-default-config")
                .help("Write the default configuration to the config path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-health")
                .long("check-health")
                .help("Validate configuration and component startup, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").ok_or_else(|| {
        ConsoleError::Config {
            message: "Missing config path argument".to_string(),
        }
    })?;

    if matches.get_flag("write-default-config") {
        Config::default().save_to_file(config_path)?;
        println!("Wrote default configuration to {}", config_path);
        return Ok(());
    }

    // Load configuration
    let mut config = Config::from_file(config_path)?;

    // Override port if specified
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let config = Arc::new(config);

    // Initialize logging
    init_logging(&config)?;

    info!("Starting Sentiment Console v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", config_path);

    // Initialize application components
    let app_state = initialize_components(config.clone())?;

    if matches.get_flag("check-health") {
        info!("All components initialized successfully, health check passed");
        return Ok(());
    }

    // Start the API server
    let server = ApiServer::new(app_state).await?;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Sentiment Console started on {}:{}",
        config.server.host, config.server.port
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = server_handle => {
            warn!("Server stopped unexpectedly");
        }
    }

    info!("Sentiment Console shut down");
    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let log_level: tracing::Level =
        config.logging.level.parse().map_err(|_| ConsoleError::Config {
            message: format!("Invalid log level: {}", config.logging.level),
        })?;
    let filter = tracing_subscriber::filter::LevelFilter::from_level(log_level);

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .json()
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_filter(filter),
            )
            .init();
    }

    info!("Logging initialized with level: {}", config.logging.level);
    Ok(())
}

/// Initialize all application components
fn initialize_components(config: Arc<Config>) -> Result<AppState> {
    info!("Initializing application components...");

    info!("Initializing record store...");
    let store = Arc::new(RecordStore::new());

    info!("Initializing sentiment model...");
    let model = Arc::new(SentimentModel::new(config.model.clone())?);

    let app_state = AppState {
        config,
        store,
        model,
    };

    info!("All components initialized successfully");
    Ok(app_state)
}
