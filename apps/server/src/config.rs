//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sentinel_core::{CameraRecord, IntervalRange, WorkerConfig};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to. `0` tries 3001-3011.
    /// Override: `SENTINEL_BIND_PORT`
    pub bind_port: u16,

    /// Origin prefixes allowed by CORS. Empty allows any origin.
    pub trusted_origins: Vec<String>,

    /// Delay between detection cycles of one monitoring session.
    pub detection_interval: IntervalRange,

    /// Delay between synthetic live events on one connection.
    pub live_event_interval: IntervalRange,

    /// Delay between synthetic sensor readings on one connection.
    pub sensor_interval: IntervalRange,

    /// System health heartbeat period in milliseconds.
    pub health_interval_ms: u64,

    /// Detection worker launch settings.
    pub worker: WorkerConfig,

    /// Base URL of the camera REST service.
    /// Override: `SENTINEL_DIRECTORY_URL`
    pub directory_url: Option<String>,

    /// Per-request timeout for the camera REST service (seconds).
    pub directory_timeout_secs: u64,

    /// Static camera catalog, used when `directory_url` is unset.
    pub cameras: Vec<CameraRecord>,

    /// Catalog consulted when the directory is unavailable.
    pub fallback_cameras: Option<Vec<CameraRecord>>,

    /// Append-only JSON-lines event log.
    /// Override: `SENTINEL_EVENT_LOG`
    pub event_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = sentinel_core::Config::default();
        Self {
            bind_port: core.preferred_port,
            trusted_origins: core.trusted_origins,
            detection_interval: core.detection_interval,
            live_event_interval: core.live_event_interval,
            sensor_interval: core.sensor_interval,
            health_interval_ms: core.health_interval_ms,
            worker: core.worker,
            directory_url: core.directory.base_url,
            directory_timeout_secs: core.directory.request_timeout_secs,
            cameras: core.directory.cameras,
            fallback_cameras: core.directory.fallback_cameras,
            event_log: core.persistence.event_log,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SENTINEL_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("SENTINEL_WORKER_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.worker.timeout_secs = Some(secs);
            }
        }

        // SENTINEL_DIRECTORY_URL and SENTINEL_EVENT_LOG are handled by clap
        // via #[arg(env = ...)] in main.rs
    }

    /// Points the worker executable at a script, replacing any leading arguments.
    pub fn set_worker_script(&mut self, script: PathBuf) {
        self.worker.args = vec![script.to_string_lossy().into_owned()];
    }

    /// Converts to sentinel-core's Config type.
    pub fn to_core_config(&self) -> sentinel_core::Config {
        sentinel_core::Config {
            preferred_port: self.bind_port,
            trusted_origins: self.trusted_origins.clone(),
            detection_interval: self.detection_interval,
            live_event_interval: self.live_event_interval,
            sensor_interval: self.sensor_interval,
            health_interval_ms: self.health_interval_ms,
            worker: self.worker.clone(),
            directory: sentinel_core::DirectoryConfig {
                base_url: self.directory_url.clone(),
                request_timeout_secs: self.directory_timeout_secs,
                cameras: self.cameras.clone(),
                fallback_cameras: self.fallback_cameras.clone(),
            },
            persistence: sentinel_core::PersistenceConfig {
                event_log: self.event_log.clone(),
            },
        }
    }
}
