//! Core configuration types.
//!
//! [`Config`] carries every tunable of the detection pipeline and the live feed.
//! All fields have defaults matching production behaviour, so an empty YAML
//! document yields a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::directory::CameraRecord;
use crate::protocol_constants::DEFAULT_WORKER_TIMEOUT_SECS;

/// Half-open millisecond range `[min_ms, max_ms)` from which a timer delay is
/// drawn each time it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl IntervalRange {
    /// Creates a range from whole seconds.
    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min * 1000,
            max_ms: max * 1000,
        }
    }

    /// Creates a degenerate range that always yields the same delay.
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }

    /// Draws the next delay. A collapsed range returns `min_ms`.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..self.max_ms))
    }

    /// Validates the range bounds.
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if self.min_ms == 0 {
            return Err(format!("{name}.min_ms must be >= 1"));
        }
        if self.max_ms < self.min_ms {
            return Err(format!(
                "{name}.max_ms ({}) must be >= min_ms ({})",
                self.max_ms, self.min_ms
            ));
        }
        Ok(())
    }
}

/// How the external inference worker is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Program to execute (e.g. `python3`).
    pub executable: String,

    /// Leading arguments placed before `<cameraId> <streamLocator>`.
    pub args: Vec<String>,

    /// Deadline in seconds after which the worker is killed. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl WorkerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            executable: "python3".to_string(),
            args: vec!["yolo_worker.py".to_string()],
            timeout_secs: Some(DEFAULT_WORKER_TIMEOUT_SECS),
        }
    }
}

/// Where camera records come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Base URL of the camera REST service. When unset, `cameras` is the directory.
    pub base_url: Option<String>,

    /// Per-request timeout for the REST directory (seconds).
    pub request_timeout_secs: u64,

    /// Static camera catalog used when no REST directory is configured.
    pub cameras: Vec<CameraRecord>,

    /// Catalog consulted when the directory is unavailable.
    /// `None` uses the builtin catalog.
    pub fallback_cameras: Option<Vec<CameraRecord>>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 5,
            cameras: Vec::new(),
            fallback_cameras: None,
        }
    }
}

/// Event persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Append-only JSON-lines event log. When unset events are kept in memory.
    pub event_log: Option<PathBuf>,
}

/// Configuration for the Sentinel core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = try the fallback range).
    pub preferred_port: u16,

    /// Origin prefixes allowed by CORS. Empty allows any origin.
    pub trusted_origins: Vec<String>,

    // Timers
    /// Delay between detection cycles of one monitoring session.
    pub detection_interval: IntervalRange,

    /// Delay between synthetic live events on one connection.
    pub live_event_interval: IntervalRange,

    /// Delay between synthetic sensor readings on one connection.
    pub sensor_interval: IntervalRange,

    /// Fixed system health heartbeat period (milliseconds).
    pub health_interval_ms: u64,

    // Collaborators
    pub worker: WorkerConfig,
    pub directory: DirectoryConfig,
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            trusted_origins: Vec::new(),
            detection_interval: IntervalRange::from_secs(5, 10),
            live_event_interval: IntervalRange::from_secs(8, 15),
            sensor_interval: IntervalRange::from_secs(5, 10),
            health_interval_ms: 2000,
            worker: WorkerConfig::default(),
            directory: DirectoryConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.detection_interval.validate("detection_interval")?;
        self.live_event_interval.validate("live_event_interval")?;
        self.sensor_interval.validate("sensor_interval")?;
        if self.health_interval_ms == 0 {
            return Err("health_interval_ms must be >= 1".to_string());
        }
        if self.worker.executable.trim().is_empty() {
            return Err("worker.executable must not be empty".to_string());
        }
        if self.worker.timeout_secs == Some(0) {
            return Err("worker.timeout_secs must be >= 1 when set".to_string());
        }
        if let Some(url) = &self.directory.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("directory.base_url must be an http(s) URL: {url}"));
            }
        }
        Ok(())
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection_interval, IntervalRange::from_secs(5, 10));
        assert_eq!(config.worker.timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn sample_stays_in_half_open_range() {
        let range = IntervalRange::from_secs(5, 10);
        for _ in 0..200 {
            let delay = range.sample();
            assert!(delay >= Duration::from_secs(5));
            assert!(delay < Duration::from_secs(10));
        }
    }

    #[test]
    fn fixed_range_always_returns_same_delay() {
        let range = IntervalRange::fixed(2000);
        assert_eq!(range.sample(), Duration::from_millis(2000));
        assert!(range.validate("fixed").is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let range = IntervalRange {
            min_ms: 10_000,
            max_ms: 5_000,
        };
        assert!(range.validate("detection_interval").is_err());
    }

    #[test]
    fn zero_health_interval_is_rejected() {
        let config = Config {
            health_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_worker_executable_is_rejected() {
        let mut config = Config::default();
        config.worker.executable = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_directory_url_is_rejected() {
        let mut config = Config::default();
        config.directory.base_url = Some("ftp://cameras".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"preferred_port": 3001, "worker": {"executable": "./w"}}"#)
                .unwrap();
        assert_eq!(config.preferred_port, 3001);
        assert_eq!(config.worker.executable, "./w");
        assert_eq!(config.worker.timeout_secs, Some(120));
        assert_eq!(config.health_interval_ms, 2000);
    }
}
