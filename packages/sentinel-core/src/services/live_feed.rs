//! Per-connection synthetic feed.
//!
//! Every live connection gets a welcome message followed by three independent
//! timers: synthetic live events, sensor readings and a host health heartbeat.
//! The timers share one cancellation token held by the connection's
//! [`FeedSubscription`], so a disconnect tears all three down in one step.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{Config, IntervalRange};
use crate::directory::CameraDirectory;
use crate::error::ErrorCode;
use crate::events::{BroadcastMessage, LiveConnection};
use crate::persistence::PersistenceGateway;
use crate::protocol_constants::WELCOME_MESSAGE;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::normalizer::EventNormalizer;
use crate::services::synthetic::{sensor_reading, SystemHealthSampler};

/// Timer periods of one subscription.
#[derive(Debug, Clone, Copy)]
pub struct FeedIntervals {
    pub live_event: IntervalRange,
    pub sensor: IntervalRange,
    pub health: Duration,
}

impl FeedIntervals {
    pub fn from_config(config: &Config) -> Self {
        Self {
            live_event: config.live_event_interval,
            sensor: config.sensor_interval,
            health: config.health_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedTimer {
    LiveEvent,
    Sensor,
    Health,
}

/// Handle to the timers of one connection.
///
/// Cancelling (or dropping) the handle stops every timer of the connection.
pub struct FeedSubscription {
    connection_id: String,
    token: CancellationToken,
}

impl FeedSubscription {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn cancel_all(&self) {
        if !self.token.is_cancelled() {
            log::debug!("[Feed] Cancelling timers for {}", self.connection_id);
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Drives the synthetic timers of every live connection.
pub struct LiveFeed {
    directory: Arc<dyn CameraDirectory>,
    persistence: Arc<dyn PersistenceGateway>,
    normalizer: EventNormalizer,
    health: SystemHealthSampler,
    intervals: FeedIntervals,
    spawner: TokioSpawner,
    /// Parent of every subscription token.
    cancel: CancellationToken,
}

impl LiveFeed {
    pub fn new(
        directory: Arc<dyn CameraDirectory>,
        persistence: Arc<dyn PersistenceGateway>,
        intervals: FeedIntervals,
        spawner: TokioSpawner,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            directory,
            persistence,
            normalizer: EventNormalizer::new(),
            health: SystemHealthSampler::new(),
            intervals,
            spawner,
            cancel,
        }
    }

    /// Sends the welcome message and starts the connection's timers.
    pub fn attach(self: &Arc<Self>, connection: Arc<dyn LiveConnection>) -> FeedSubscription {
        let token = self.cancel.child_token();
        deliver(&connection, &token, &BroadcastMessage::connected(WELCOME_MESSAGE));

        for timer in [FeedTimer::LiveEvent, FeedTimer::Sensor, FeedTimer::Health] {
            self.spawner.spawn(run_timer(
                Arc::clone(self),
                timer,
                Arc::clone(&connection),
                token.clone(),
            ));
        }

        log::info!("[Feed] Attached live feed to {}", connection.id());
        FeedSubscription {
            connection_id: connection.id().to_string(),
            token,
        }
    }

    fn delay_for(&self, timer: FeedTimer) -> Duration {
        match timer {
            FeedTimer::LiveEvent => self.intervals.live_event.sample(),
            FeedTimer::Sensor => self.intervals.sensor.sample(),
            FeedTimer::Health => self.intervals.health,
        }
    }

    async fn fire(
        &self,
        timer: FeedTimer,
        connection: &Arc<dyn LiveConnection>,
        token: &CancellationToken,
    ) {
        match timer {
            FeedTimer::LiveEvent => self.fire_live_event(connection, token).await,
            FeedTimer::Sensor => {
                deliver(connection, token, &BroadcastMessage::SensorUpdate(sensor_reading()));
            }
            FeedTimer::Health => {
                deliver(connection, token, &BroadcastMessage::SystemHealth(self.health.sample()));
            }
        }
    }

    async fn fire_live_event(&self, connection: &Arc<dyn LiveConnection>, token: &CancellationToken) {
        let camera = match self.directory.random_online().await {
            Ok(Some(camera)) => camera,
            Ok(None) => {
                log::debug!("[Feed] No online camera for a live event");
                return;
            }
            Err(e) => {
                log::warn!("[Feed] Live event camera pick failed ({}): {}", e.code(), e);
                return;
            }
        };

        let event = self.normalizer.synthetic_event(&camera);
        let message = BroadcastMessage::Event(event.clone());

        let persist = async {
            if let Err(e) = self.persistence.append(&event).await {
                log::error!(
                    "[Feed] Failed to persist live event {} ({}): {}",
                    event.id,
                    e.code(),
                    e
                );
            }
        };
        let send = async { deliver(connection, token, &message) };
        tokio::join!(persist, send);
    }
}

/// Sends a message if the subscription is live and the connection is open.
fn deliver(
    connection: &Arc<dyn LiveConnection>,
    token: &CancellationToken,
    message: &BroadcastMessage,
) -> bool {
    if token.is_cancelled() || !connection.is_open() {
        return false;
    }
    let text = match message.to_json() {
        Ok(text) => text,
        Err(e) => {
            log::error!("[Feed] Failed to encode {} message: {}", message.channel(), e);
            return false;
        }
    };
    match connection.send(&text) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("[Feed] Send to {} failed: {}", connection.id(), e);
            false
        }
    }
}

async fn run_timer(
    feed: Arc<LiveFeed>,
    timer: FeedTimer,
    connection: Arc<dyn LiveConnection>,
    token: CancellationToken,
) {
    loop {
        let delay = feed.delay_for(timer);
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        if !connection.is_open() {
            continue;
        }
        feed.fire(timer, &connection, &token).await;
    }
    log::debug!("[Feed] {:?} timer for {} stopped", timer, connection.id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{CameraRecord, StaticCameraDirectory};
    use crate::events::SendError;
    use crate::persistence::MemoryEventStore;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeConnection {
        id: String,
        open: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl FakeConnection {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                open: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn channels(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .map(|text| {
                    let value: Value = serde_json::from_str(text).unwrap();
                    value["channel"].as_str().unwrap().to_string()
                })
                .collect()
        }

        fn count(&self, channel: &str) -> usize {
            self.channels().iter().filter(|c| *c == channel).count()
        }
    }

    impl LiveConnection for FakeConnection {
        fn id(&self) -> &str {
            &self.id
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send(&self, text: &str) -> Result<(), SendError> {
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    fn feed(store: Arc<MemoryEventStore>) -> Arc<LiveFeed> {
        let directory = StaticCameraDirectory::new(vec![CameraRecord::new(
            "CAM-0007",
            "Transit Hub Cam 7",
            "Transit Hub",
            "smart_city",
            "rtsp://hub/7",
        )]);
        Arc::new(LiveFeed::new(
            Arc::new(directory),
            store,
            FeedIntervals {
                live_event: IntervalRange::fixed(8000),
                sensor: IntervalRange::fixed(5000),
                health: Duration::from_millis(2000),
            },
            TokioSpawner::current(),
            CancellationToken::new(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_then_all_three_timers_fire() {
        let store = Arc::new(MemoryEventStore::new());
        let feed = feed(store.clone());
        let conn = FakeConnection::new("ws-1");

        let _subscription = feed.attach(conn.clone());
        assert_eq!(conn.channels(), vec!["connected"]);

        tokio::time::sleep(Duration::from_millis(8_100)).await;

        assert_eq!(conn.count("system_health"), 4);
        assert_eq!(conn.count("sensor_update"), 1);
        assert_eq!(conn.count("event"), 1);
        assert_eq!(store.len(), 1);

        let welcome: Value = serde_json::from_str(&conn.sent.lock()[0]).unwrap();
        assert_eq!(
            welcome["data"]["message"],
            "Connected to SENTINEL Intelligence Feed"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_sends_after_cancel_all() {
        let feed = feed(Arc::new(MemoryEventStore::new()));
        let conn = FakeConnection::new("ws-1");

        let subscription = feed.attach(conn.clone());
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let before = conn.sent.lock().len();

        subscription.cancel_all();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(conn.sent.lock().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_subscription_cancels_timers() {
        let feed = feed(Arc::new(MemoryEventStore::new()));
        let conn = FakeConnection::new("ws-1");

        drop(feed.attach(conn.clone()));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(conn.channels(), vec!["connected"]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_connection_receives_nothing() {
        let feed = feed(Arc::new(MemoryEventStore::new()));
        let conn = FakeConnection::new("ws-1");
        let _subscription = feed.attach(conn.clone());

        conn.open.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(conn.channels(), vec!["connected"]);
    }

    #[tokio::test(start_paused = true)]
    async fn live_event_is_sent_even_when_persistence_fails() {
        let store = Arc::new(MemoryEventStore::new());
        store.set_failing(true);
        let feed = feed(store.clone());
        let conn = FakeConnection::new("ws-1");
        let _subscription = feed.attach(conn.clone());

        tokio::time::sleep(Duration::from_millis(8_100)).await;

        assert_eq!(conn.count("event"), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn connections_have_independent_timers() {
        let feed = feed(Arc::new(MemoryEventStore::new()));
        let first = FakeConnection::new("ws-1");
        let second = FakeConnection::new("ws-2");

        let first_sub = feed.attach(first.clone());
        let _second_sub = feed.attach(second.clone());
        first_sub.cancel_all();

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(first.count("system_health"), 0);
        assert_eq!(second.count("system_health"), 1);
    }
}
