//! Sentinel Server - standalone host for the SENTINEL live detection feed.
//!
//! Serves the analysis control endpoints and the WebSocket intelligence feed,
//! running detection sessions against an external worker process.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_core::{bootstrap_services, start_server};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Sentinel Server - live camera detection feed.
#[derive(Parser, Debug)]
#[command(name = "sentinel-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "SENTINEL_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "SENTINEL_BIND_PORT")]
    port: Option<u16>,

    /// Detection worker script handed to the worker executable (overrides config file).
    #[arg(short = 'w', long, value_name = "FILE", env = "SENTINEL_WORKER")]
    worker: Option<PathBuf>,

    /// Base URL of the camera REST service (overrides config file).
    #[arg(long, value_name = "URL", env = "SENTINEL_DIRECTORY_URL")]
    directory_url: Option<String>,

    /// Append detection events to this JSON-lines file (overrides config file).
    #[arg(long, value_name = "FILE", env = "SENTINEL_EVENT_LOG")]
    event_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Sentinel Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(script) = args.worker {
        config.set_worker_script(script);
    }
    if let Some(url) = args.directory_url {
        config.directory_url = Some(url);
    }
    if let Some(path) = args.event_log {
        config.event_log = Some(path);
    }

    log::info!(
        "Configuration: bind_port={}, worker={} {:?}, directory={}",
        config.bind_port,
        config.worker.executable,
        config.worker.args,
        config.directory_url.as_deref().unwrap_or("static")
    );

    let services =
        bootstrap_services(config.to_core_config()).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let server_shutdown = CancellationToken::new();
    let server_handle = {
        let app_state = services.app_state();
        let shutdown = server_shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = start_server(app_state, shutdown).await {
                log::error!("Server error: {}", e);
            }
        })
    };

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Close sockets first so the graceful HTTP shutdown is not held open by them.
    services.shutdown();
    server_shutdown.cancel();

    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
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
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
