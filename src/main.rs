//! CDN Server
//!
//! Serves every object in a storage backend at its own HTTP path, with
//! on-the-fly resizing and re-encoding of PNG and JPEG images. New objects
//! are picked up by a background scan that runs on a fixed interval.

mod config;
mod config_file;
mod content_type;
mod error;
mod http;
#[cfg(test)]
mod integration;
mod refresh;
mod route_table;
mod state;
mod storage;
mod transform;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{CdnError, Result};
use crate::http::create_router;
use crate::refresh::RouteRefresher;
use crate::state::AppState;
use crate::storage::{FilesystemStorage, StoragePort};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "cdn-server";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about = "Content delivery server with image transforms")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "config.toml")]
    config: PathBuf,

    /// Write a default configuration file to the config path and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        config_file::generate_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    // RUST_LOG still wins over the configured level
    let loaded = config_file::load_server_config(&args.config);
    match &loaded {
        Ok(config) => init_logging(&config.log_level, &config.log_format),
        Err(_) => init_logging("info", "pretty"),
    }
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config file {}: {}", args.config.display(), e);
            return Err(e);
        }
    };
    if !args.config.exists() {
        tracing::warn!(
            "Config file {} not found, using defaults",
            args.config.display()
        );
    }

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!("Configuration loaded: {:?}", config);

    let storage = build_storage(&config).await?;
    tracing::info!("Using {} storage backend", storage.name());

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), storage));

    // Routes exist before the first request is accepted
    let refresher = RouteRefresher::new(state.clone(), config.refresh.interval());
    match refresher.tick().await {
        Ok(count) => tracing::info!("Initial scan registered {} route(s)", count),
        Err(e) => tracing::warn!("Initial scan failed, retrying in {:?}: {}", config.refresh.interval(), e),
    }
    let refresh_task = refresher.spawn();

    // Build router
    let app = create_router(state.clone());

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| CdnError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::spawn({
        let state = state.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown requested");
            state.shutdown();
        }
    });

    let server_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_state.shutdown.wait().await })
        .await?;

    // Server stopped for some other reason; stop the scanner too
    state.shutdown();
    if let Err(e) = refresh_task.await {
        tracing::error!("Refresh task ended abnormally: {}", e);
    }

    tracing::info!("{} stopped", APP_NAME);
    Ok(())
}

/// Create the configured storage backend
async fn build_storage(config: &ServerConfig) -> Result<Arc<dyn StoragePort>> {
    if config.storage.is_filesystem() {
        let storage = FilesystemStorage::new(&config.storage.directory).await?;
        tracing::info!("Serving files from {}", storage.root().display());
        return Ok(Arc::new(storage));
    }

    Err(CdnError::Config(format!(
        "unsupported storage class '{}'",
        config.storage.class
    )))
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Initialize logging with tracing
fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("cdn_server={},tower_http={}", level, level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["cdn-server"]);
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(!args.generate_config);

        let args = Args::parse_from(["cdn-server", "/etc/cdn.toml", "--generate-config"]);
        assert_eq!(args.config, PathBuf::from("/etc/cdn.toml"));
        assert!(args.generate_config);
    }

    #[tokio::test]
    async fn test_build_storage_rejects_unknown_class() {
        let mut config = ServerConfig::default();
        config.storage.class = "s3".to_string();
        assert!(matches!(build_storage(&config).await, Err(CdnError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_storage_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.storage.directory = dir.path().join("cdn");

        let storage = build_storage(&config).await.unwrap();
        assert_eq!(storage.name(), "filesystem");
        assert!(dir.path().join("cdn").is_dir());
    }
}
