//! Broadcast abstraction for decoupling services from transport.
//!
//! Services depend on the [`Broadcaster`] trait rather than the WebSocket hub,
//! enabling testing and alternative transport implementations.

use thiserror::Error;

use super::BroadcastMessage;

/// Failure to hand a frame to a live connection.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
}

/// A standing push channel to one operator console.
pub trait LiveConnection: Send + Sync {
    /// Stable identifier used for logging and registry bookkeeping.
    fn id(&self) -> &str;

    /// Whether the connection can currently accept a frame.
    fn is_open(&self) -> bool;

    /// Queues one text frame for delivery.
    fn send(&self, text: &str) -> Result<(), SendError>;
}

/// Trait for fanning a message out to every open live connection.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     broadcaster: Arc<dyn Broadcaster>,
/// }
///
/// impl MyService {
///     fn announce(&self, event: Event) {
///         let delivered = self.broadcaster.broadcast(&BroadcastMessage::Event(event));
///     }
/// }
/// ```
pub trait Broadcaster: Send + Sync {
    /// Sends the message to all open connections and returns the number of
    /// successful sends.
    fn broadcast(&self, message: &BroadcastMessage) -> usize;
}
