//! Camera directory: resolves camera ids to display attributes and stream locators.
//!
//! The directory is an external collaborator. [`HttpCameraDirectory`] talks to the
//! camera REST service, [`StaticCameraDirectory`] serves an in-memory catalog, and
//! [`FallbackCatalog`] is consulted when the directory cannot be reached.

mod catalog;
mod http;

pub use catalog::FallbackCatalog;
pub use http::HttpCameraDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol_constants::DEFAULT_STREAM_LOCATOR;
use crate::utils::pick;

/// Errors returned by a [`CameraDirectory`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The directory answered and does not know this camera.
    #[error("camera not found: {0}")]
    NotFound(String),

    /// The directory could not be queried (transport failure, 5xx, bad body).
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Convenient Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

fn default_stream_locator() -> String {
    DEFAULT_STREAM_LOCATOR.to_string()
}

fn default_status() -> String {
    "online".to_string()
}

/// Display attributes and stream locator of one camera.
///
/// Fetched fresh for every detection cycle; never cached across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub id: String,
    pub name: String,
    pub zone: String,
    pub industry: String,
    #[serde(
        rename = "streamUrl",
        alias = "streamLocator",
        alias = "stream_url",
        default = "default_stream_locator"
    )]
    pub stream_url: String,
    #[serde(default = "default_status")]
    pub status: String,
}

impl CameraRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        zone: impl Into<String>,
        industry: impl Into<String>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zone: zone.into(),
            industry: industry.into(),
            stream_url: stream_url.into(),
            status: default_status(),
        }
    }

    /// Returns a copy with a different operational status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

/// Trait for resolving cameras.
///
/// Used by the detection cycle runner (lookup) and the live feed (random
/// online camera for synthetic events).
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    /// Resolves a camera id.
    async fn lookup(&self, camera_id: &str) -> DirectoryResult<CameraRecord>;

    /// Picks a random camera whose status is online, if any.
    async fn random_online(&self) -> DirectoryResult<Option<CameraRecord>>;
}

/// In-memory directory backed by a fixed list of cameras.
pub struct StaticCameraDirectory {
    cameras: Vec<CameraRecord>,
}

impl StaticCameraDirectory {
    pub fn new(cameras: Vec<CameraRecord>) -> Self {
        Self { cameras }
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

#[async_trait]
impl CameraDirectory for StaticCameraDirectory {
    async fn lookup(&self, camera_id: &str) -> DirectoryResult<CameraRecord> {
        self.cameras
            .iter()
            .find(|c| c.id == camera_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(camera_id.to_string()))
    }

    async fn random_online(&self) -> DirectoryResult<Option<CameraRecord>> {
        let online: Vec<&CameraRecord> = self.cameras.iter().filter(|c| c.is_online()).collect();
        Ok(pick(&online).map(|c| (*c).clone()))
    }
}
