//! Relaybox - Webhook-driven WhatsApp relay and inbox store
//!
//! Receives provider webhook deliveries, reconciles them into a local
//! conversation inbox, and relays outbound text messages to the
//! provider send API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use relaybox::{
    api::build_app,
    config::{resolve_credential, RelayConfig, StorageBackend},
    inbox::{ConversationStore, InboxState, MemoryStore, SqliteStore},
    outbound::Dispatcher,
    webhook::{Reconciler, WebhookState},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relaybox")]
#[command(version)]
#[command(about = "Webhook-driven WhatsApp relay and inbox store")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RELAYBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Host to bind to (overrides the configuration file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the configuration file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send a text message through the provider
    Send {
        /// Recipient phone identifier
        #[arg(short = 't', long)]
        to: String,

        /// Message text
        #[arg(short, long)]
        message: String,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("relaybox={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        let content = std::fs::read_to_string(&config_path)?;
        toml::from_str(&content)?
    } else {
        RelayConfig::default()
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_serve(config, host, port).await?;
        }
        Commands::Send { to, message } => {
            run_send(config, &to, &message).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_serve(config: RelayConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    tracing::info!("Starting Relaybox");

    let store = build_store(&config)?;
    let verify_token = resolve_credential(&config.whatsapp.verify_token_ref)?;
    let dispatcher = Arc::new(Dispatcher::new(config.whatsapp.clone(), store.clone())?);
    let reconciler = Arc::new(Reconciler::new(store.clone()));

    let webhook_state = WebhookState {
        reconciler,
        verify_token,
    };
    let inbox_state = InboxState { store, dispatcher };
    let app = build_app(webhook_state, inbox_state, &config.server.cors_origins);

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Relaybox is listening on {}. Press Ctrl+C to stop.", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down..."),
        Err(err) => {
            tracing::error!("Failed to listen for shutdown signal: {}", err);
            // Without a signal handler there is nothing to wait for
            std::future::pending::<()>().await;
        }
    }
}

fn build_store(config: &RelayConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory conversation store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let path = config.storage.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!("Opening conversation store at {}", path.display());
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}

async fn run_send(config: RelayConfig, to: &str, message: &str) -> Result<()> {
    let store = build_store(&config)?;
    let dispatcher = Dispatcher::new(config.whatsapp.clone(), store)?;

    let receipt = dispatcher.send(to, message).await?;
    match receipt.message_id {
        Some(id) => println!("Message sent (provider id: {})", id),
        None => println!("Message sent"),
    }

    Ok(())
}

fn show_config(config: Option<&RelayConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
