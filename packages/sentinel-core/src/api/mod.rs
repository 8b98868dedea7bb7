//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::protocol_constants::FALLBACK_PORT_RANGE;
use crate::services::{DetectionService, LiveFeed};

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::{ConnectionGuard, ConnectionHub, WsLiveConnection};

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
///
/// Holds references to services only; all behaviour lives in the services.
#[derive(Clone)]
pub struct AppState {
    /// Monitoring sessions and detection cycles.
    pub detection: Arc<DetectionService>,
    /// Per-connection synthetic timers.
    pub live_feed: Arc<LiveFeed>,
    /// Live connections and detection fan-out.
    pub hub: Arc<ConnectionHub>,
    pub config: Arc<RwLock<Config>>,
}

async fn find_available_port(start: u16, end: u16) -> Result<(u16, TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Binds the configured port, or the first free port of the fallback range.
pub async fn bind_listener(preferred_port: u16) -> Result<(u16, TcpListener), ServerError> {
    if preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        return Ok((preferred_port, TcpListener::bind(&addr).await?));
    }
    find_available_port(FALLBACK_PORT_RANGE.0, FALLBACK_PORT_RANGE.1).await
}

/// Serves the API until `shutdown` is cancelled.
pub async fn start_server(state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let (port, listener) = bind_listener(preferred_port).await?;

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_port_binds_that_port() {
        let scratch = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = scratch.local_addr().unwrap().port();
        drop(scratch);

        let (bound, _listener) = bind_listener(port).await.unwrap();
        assert_eq!(bound, port);
    }

    #[tokio::test]
    async fn busy_range_reports_no_available_port() {
        let held = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = held.local_addr().unwrap().port();

        let err = find_available_port(port, port).await.unwrap_err();
        assert!(matches!(err, ServerError::NoAvailablePort { .. }));
    }
}
