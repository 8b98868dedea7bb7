//! Persist-and-broadcast of finished events.

use std::sync::Arc;

use crate::error::ErrorCode;
use crate::events::{BroadcastMessage, Broadcaster, Event};
use crate::persistence::PersistenceGateway;

/// Result of publishing one event.
#[derive(Debug, Clone)]
pub struct Publication {
    pub event: Event,
    /// Whether the persistence append succeeded.
    pub persisted: bool,
    /// Number of live connections the event was sent to.
    pub delivered: usize,
}

/// Sends events to the store and to every live connection.
///
/// The append and the fan-out run concurrently; a failed or slow append never
/// withholds the broadcast.
pub struct EventPublisher {
    persistence: Arc<dyn PersistenceGateway>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl EventPublisher {
    pub fn new(persistence: Arc<dyn PersistenceGateway>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            persistence,
            broadcaster,
        }
    }

    pub async fn publish(&self, event: Event) -> Publication {
        let message = BroadcastMessage::Event(event.clone());

        let persist = async {
            match self.persistence.append(&event).await {
                Ok(()) => true,
                Err(e) => {
                    log::error!(
                        "[Publisher] Failed to persist event {} ({}): {}",
                        event.id,
                        e.code(),
                        e
                    );
                    false
                }
            }
        };
        let fan_out = async { self.broadcaster.broadcast(&message) };

        let (persisted, delivered) = tokio::join!(persist, fan_out);
        tracing::debug!(
            event_id = %event.id,
            source_id = %event.source_id,
            persisted,
            delivered,
            "event_published"
        );

        Publication {
            event,
            persisted,
            delivered,
        }
    }
}
