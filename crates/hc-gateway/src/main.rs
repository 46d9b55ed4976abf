//! hc-gateway: Warmy HealthConnect Gateway Main Binary
//!
//! Main entry point for the WhatsApp intake gateway.
//!
//! Usage:
//!   hc-gateway           - Start the webhook server
//!   hc-gateway --help    - Show help

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use hc_core::{Config, UserStore};
use hc_whatsapp::{CloudApi, MessageHandler, MessageSender, WebhookServer, WebhookState};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Webhook server mode
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("hc-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration (hc-gateway.toml, overridden by environment)
    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting hc-gateway...");

    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("hc-gateway - Warmy HealthConnect WhatsApp Gateway");
    println!();
    println!("Usage:");
    println!("  hc-gateway           Start the webhook server");
    println!("  hc-gateway --help    Show this help message");
    println!("  hc-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  WHATSAPP_ACCESS_TOKEN     Graph API access token (required)");
    println!("  WHATSAPP_VERIFY_TOKEN     Webhook verify token (required)");
    println!("  WHATSAPP_PHONE_NUMBER_ID  Business phone number id (required)");
    println!("  WHATSAPP_APP_SECRET       App secret for signature checks (optional)");
    println!("  PORT                      Webhook server port (default: 3000)");
    println!("  DB_PATH                   SQLite database path (default: data/hc-gateway.db)");
}

/// Run the webhook server until Ctrl+C
async fn run_server(config: Config) -> anyhow::Result<()> {
    // The default db path lives under data/
    if let Some(parent) = std::path::Path::new(&config.store.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = UserStore::new(&config.store.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open user store: {}", e))?;
    let user_count = store
        .count()
        .map_err(|e| anyhow::anyhow!("Failed to read user store: {}", e))?;
    tracing::info!(
        "User store ready at {} ({} users)",
        config.store.db_path,
        user_count
    );

    let api = CloudApi::new(
        config.whatsapp.access_token.clone(),
        config.whatsapp.phone_number_id.clone(),
    );
    let sender: Arc<dyn MessageSender> = Arc::new(api);

    let store = Arc::new(Mutex::new(store));
    let handler = Arc::new(MessageHandler::new(Arc::clone(&store), Arc::clone(&sender)));

    let state = WebhookState {
        verify_token: config.whatsapp.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
        handler,
        sender,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let server = WebhookServer::new(addr, state);

    let handle = tokio::spawn(async move {
        if let Err(e) = server.start().await {
            tracing::error!("Webhook server error: {}", e);
        }
    });

    tracing::info!("hc-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    handle.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
