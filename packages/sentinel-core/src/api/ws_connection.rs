//! WebSocket connection tracking and fan-out.
//!
//! - `ConnectionHub`: tracks every live connection and broadcasts to them
//! - `ConnectionGuard`: RAII guard for automatic cleanup on disconnect
//! - `WsLiveConnection`: [`LiveConnection`] backed by a socket writer channel

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{BroadcastMessage, Broadcaster, LiveConnection, SendError};

/// Live connection whose frames are written by the socket task.
///
/// `send` only queues the frame; the socket task drains the channel.
pub struct WsLiveConnection {
    id: String,
    tx: mpsc::UnboundedSender<String>,
    open: AtomicBool,
}

impl WsLiveConnection {
    /// Creates the connection and the receiver the socket task drains.
    pub fn new(id: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            id: id.into(),
            tx,
            open: AtomicBool::new(true),
        });
        (connection, rx)
    }

    /// Marks the connection closed; later sends are refused.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl LiveConnection for WsLiveConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn send(&self, text: &str) -> Result<(), SendError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        self.tx.send(text.to_string()).map_err(|_| SendError::Closed)
    }
}

/// Tracks all live connections.
///
/// Thread-safe and designed for concurrent access from multiple WebSocket
/// handlers. Uses hierarchical cancellation tokens for force-close of all
/// connections.
pub struct ConnectionHub {
    connections: DashMap<String, Arc<dyn LiveConnection>>,
    next_id: AtomicU64,
    /// Wrapped in RwLock so it can be replaced after close_all().
    global_cancel: RwLock<CancellationToken>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Allocates an id for a connection about to be registered.
    pub fn next_connection_id(&self) -> String {
        format!("ws-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a connection and returns a guard that unregisters it on drop.
    pub fn register(self: &Arc<Self>, connection: Arc<dyn LiveConnection>) -> ConnectionGuard {
        let id = connection.id().to_string();
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(id.clone(), connection);
        log::info!(
            "[WS] Connection registered: {} (total: {})",
            id,
            self.connections.len()
        );

        ConnectionGuard {
            id,
            hub: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: &str) {
        if self.connections.remove(id).is_some() {
            log::info!(
                "[WS] Connection unregistered: {} (remaining: {})",
                id,
                self.connections.len()
            );
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Force-closes all connections.
    ///
    /// Cancels the global token, then installs a fresh one so new connections
    /// can still be accepted. Returns the number of connections signaled.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
        }
        let mut guard = self.global_cancel.write();
        guard.cancel();
        *guard = CancellationToken::new();
        count
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for ConnectionHub {
    fn broadcast(&self, message: &BroadcastMessage) -> usize {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                log::error!("[WS] Failed to encode {} message: {}", message.channel(), e);
                return 0;
            }
        };

        // Snapshot first so no map shard lock is held while sending.
        let targets: Vec<Arc<dyn LiveConnection>> =
            self.connections.iter().map(|e| Arc::clone(e.value())).collect();

        let delivered = targets
            .iter()
            .filter(|c| c.is_open() && c.send(&text).is_ok())
            .count();

        log::info!(
            "[WS] Broadcast {} to {}/{} client(s)",
            message.channel(),
            delivered,
            targets.len()
        );
        delivered
    }
}

/// RAII guard that unregisters a connection when dropped.
pub struct ConnectionGuard {
    id: String,
    hub: Arc<ConnectionHub>,
    /// Cancelled on force-close.
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.unregister(&self.id);
    }
}
