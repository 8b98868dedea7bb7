//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. Collaborators are built from
//! [`Config`] by [`bootstrap_services`], or injected directly through
//! [`bootstrap_services_with`] for tests and embedders.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::api::{AppState, ConnectionHub};
use crate::config::Config;
use crate::directory::{
    CameraDirectory, FallbackCatalog, HttpCameraDirectory, StaticCameraDirectory,
};
use crate::error::{SentinelError, SentinelResult};
use crate::events::Broadcaster;
use crate::persistence::{JsonlEventStore, NoopEventStore, PersistenceGateway};
use crate::runtime::TokioSpawner;
use crate::services::{DetectionCycleRunner, DetectionService, EventPublisher, FeedIntervals, LiveFeed};
use crate::worker::{ProcessWorker, WorkerInvoker};

/// External collaborators the services depend on.
pub struct Collaborators {
    pub directory: Arc<dyn CameraDirectory>,
    pub worker: Arc<dyn WorkerInvoker>,
    pub persistence: Arc<dyn PersistenceGateway>,
}

impl Collaborators {
    /// Builds the collaborators described by the configuration.
    pub fn from_config(config: &Config) -> SentinelResult<Self> {
        let directory: Arc<dyn CameraDirectory> = match &config.directory.base_url {
            Some(url) => {
                log::info!("[Bootstrap] Camera directory: {}", url);
                let timeout = Duration::from_secs(config.directory.request_timeout_secs);
                Arc::new(
                    HttpCameraDirectory::new(url.clone(), timeout)
                        .map_err(|e| SentinelError::Configuration(e.to_string()))?,
                )
            }
            None if config.directory.cameras.is_empty() => {
                log::info!("[Bootstrap] Camera directory: builtin catalog");
                Arc::new(StaticCameraDirectory::new(
                    FallbackCatalog::builtin().cameras().to_vec(),
                ))
            }
            None => {
                log::info!(
                    "[Bootstrap] Camera directory: {} configured camera(s)",
                    config.directory.cameras.len()
                );
                Arc::new(StaticCameraDirectory::new(config.directory.cameras.clone()))
            }
        };

        let persistence: Arc<dyn PersistenceGateway> = match &config.persistence.event_log {
            Some(path) => {
                log::info!("[Bootstrap] Event log: {}", path.display());
                Arc::new(JsonlEventStore::new(path.clone()))
            }
            None => {
                log::info!("[Bootstrap] Event log disabled, events are not stored");
                Arc::new(NoopEventStore)
            }
        };
        log::debug!("[Bootstrap] Persistence backend: {}", persistence.name());

        Ok(Self {
            directory,
            worker: Arc::new(ProcessWorker::from_config(&config.worker)),
            persistence,
        })
    }
}

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Monitoring sessions and detection cycles.
    pub detection: Arc<DetectionService>,
    /// Per-connection synthetic timers.
    pub live_feed: Arc<LiveFeed>,
    /// Live connections and detection fan-out.
    pub hub: Arc<ConnectionHub>,
    pub config: Arc<RwLock<Config>>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Parent of every session and subscription token.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Builds the shared state handed to the API layer.
    pub fn app_state(&self) -> AppState {
        AppState {
            detection: Arc::clone(&self.detection),
            live_feed: Arc::clone(&self.live_feed),
            hub: Arc::clone(&self.hub),
            config: Arc::clone(&self.config),
        }
    }

    /// Stops every session, cancels every feed timer and closes all sockets.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        let sessions = self.detection.stop_all();
        log::info!("[Bootstrap] Stopped {} session(s)", sessions);

        let connections = self.hub.close_all();
        log::info!("[Bootstrap] Closed {} WebSocket connection(s)", connections);

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Validates the configuration and wires services with collaborators built
/// from it.
///
/// Must be called from within a Tokio runtime.
pub fn bootstrap_services(config: Config) -> SentinelResult<BootstrappedServices> {
    config.validate().map_err(SentinelError::Configuration)?;
    let collaborators = Collaborators::from_config(&config)?;
    Ok(bootstrap_services_with(config, collaborators))
}

/// Wires services around the given collaborators.
///
/// Must be called from within a Tokio runtime.
pub fn bootstrap_services_with(config: Config, collaborators: Collaborators) -> BootstrappedServices {
    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();
    let hub = Arc::new(ConnectionHub::new());

    let fallback = match &config.directory.fallback_cameras {
        Some(cameras) => FallbackCatalog::new(cameras.clone()),
        None => FallbackCatalog::builtin(),
    };

    let publisher = Arc::new(EventPublisher::new(
        Arc::clone(&collaborators.persistence),
        Arc::clone(&hub) as Arc<dyn Broadcaster>,
    ));

    let runner = Arc::new(DetectionCycleRunner::new(
        Arc::clone(&collaborators.directory),
        fallback,
        collaborators.worker,
        publisher,
    ));

    let detection = Arc::new(DetectionService::new(
        runner,
        config.detection_interval,
        spawner.clone(),
        cancel_token.clone(),
    ));

    let live_feed = Arc::new(LiveFeed::new(
        collaborators.directory,
        collaborators.persistence,
        FeedIntervals::from_config(&config),
        spawner.clone(),
        cancel_token.clone(),
    ));

    BootstrappedServices {
        detection,
        live_feed,
        hub,
        config: Arc::new(RwLock::new(config)),
        spawner,
        cancel_token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            health_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            bootstrap_services(config),
            Err(SentinelError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn default_config_bootstraps() {
        let services = bootstrap_services(Config::default()).unwrap();
        assert!(services.detection.active_sessions().is_empty());
        assert_eq!(services.hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_sessions() {
        let mut config = Config::default();
        config.worker.executable = "/nonexistent/worker".to_string();
        let services = bootstrap_services(config).unwrap();

        services.detection.start("CAM-0001").unwrap();
        assert!(services.detection.is_active("CAM-0001"));

        services.shutdown();
        assert!(!services.detection.is_active("CAM-0001"));
        assert!(services.cancel_token.is_cancelled());
    }

    #[tokio::test]
    async fn start_after_shutdown_is_refused() {
        let services = bootstrap_services(Config::default()).unwrap();
        services.shutdown();

        assert!(matches!(
            services.detection.start("CAM-0001"),
            Err(SentinelError::ShuttingDown)
        ));
        assert!(services.detection.active_sessions().is_empty());
    }

    #[tokio::test]
    async fn default_persistence_discards_events() {
        let collaborators = Collaborators::from_config(&Config::default()).unwrap();
        assert_eq!(collaborators.persistence.name(), "noop");
    }

    #[tokio::test]
    async fn event_log_selects_jsonl_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.persistence.event_log = Some(dir.path().join("events.jsonl"));

        let collaborators = Collaborators::from_config(&config).unwrap();
        assert_eq!(collaborators.persistence.name(), "jsonl");
    }
}
