//! redactor-gen - Article generation service
//!
//! Turns a topic into a finished HTML article through four model calls
//! (plan, draft, review, final), streams progress to the caller and stores
//! articles in the user's document store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use redactor_common::config::{self as common_config, RootFolderInitializer, TomlConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use redactor_gen::services::{DriveClient, GeminiClient};
use redactor_gen::AppState;

/// Command-line arguments for redactor-gen
#[derive(Parser, Debug)]
#[command(name = "redactor-gen")]
#[command(about = "Multi-stage article generation service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and default config
    #[arg(short, long, env = "REDACTOR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML config file (defaults to <root>/redactor.toml)
    #[arg(short, long, env = "REDACTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding [server] port
    #[arg(short, long, env = "REDACTOR_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config has to be read before logging starts; it carries the log level
    let config_path = args.config.clone().unwrap_or_else(|| {
        common_config::resolve_root_folder(args.root_folder.as_deref(), None)
            .join(common_config::CONFIG_FILE_NAME)
    });
    let toml_config = common_config::load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(&toml_config)?;

    info!("Starting redactor-gen (Article Generation) service");
    info!("Version: {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));
    info!("Config: {}", config_path.display());

    let root_folder =
        common_config::resolve_root_folder(args.root_folder.as_deref(), Some(&toml_config));
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = redactor_gen::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let api_key = redactor_gen::config::resolve_provider_api_key(&db_pool, &toml_config).await?;
    let provider = Arc::new(
        GeminiClient::new(&toml_config.provider, api_key)
            .context("Failed to build completion client")?,
    );
    let document_store =
        Arc::new(DriveClient::new(&toml_config.drive).context("Failed to build Drive client")?);

    let shutdown = CancellationToken::new();
    let state = AppState::new(
        db_pool,
        provider,
        document_store,
        &toml_config,
        shutdown.clone(),
    )?;
    if !state.oauth.is_configured() {
        warn!("[drive] client_id/client_secret not set; uploads are unavailable");
    }

    let app = redactor_gen::build_router(state);

    let port = args.port.unwrap_or(toml_config.server.port);
    let addr: SocketAddr = format!("{}:{}", toml_config.server.host, port)
        .parse()
        .context("Invalid [server] host")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// RUST_LOG wins over [logging] level; [logging] file redirects output
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then stop background batches
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
