//! Best-effort event persistence.
//!
//! Persistence never blocks a live broadcast: callers drive `append` concurrently
//! with the fan-out and only log failures. There is no retry or buffering.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::events::Event;

/// Errors that can occur while appending an event.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store is unreachable or refusing writes.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Convenient Result alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Trait for durable event appends.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn append(&self, event: &Event) -> PersistenceResult<()>;

    /// Short backend name for startup logs.
    fn name(&self) -> &'static str;
}

/// Row shape of the events table: snake_case columns, metadata as a JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEvent {
    pub id: String,
    pub timestamp: String,
    pub source: String,
    pub source_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: String,
    pub description: String,
    pub industry: String,
    pub zone: String,
    pub acknowledged: bool,
    pub metadata: String,
}

impl PersistedEvent {
    pub fn from_event(event: &Event) -> PersistenceResult<Self> {
        Ok(Self {
            id: event.id.clone(),
            timestamp: event.timestamp.to_rfc3339(),
            source: event.source.as_str().to_string(),
            source_id: event.source_id.clone(),
            event_type: event.event_type.clone(),
            severity: event.severity.as_str().to_string(),
            description: event.description.clone(),
            industry: event.industry.clone(),
            zone: event.zone.clone(),
            acknowledged: event.acknowledged,
            metadata: serde_json::to_string(&event.metadata)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-lines file store
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only JSON-lines event log. One [`PersistedEvent`] per line.
pub struct JsonlEventStore {
    path: PathBuf,
    /// Serializes appends so concurrent lines never interleave.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistenceGateway for JsonlEventStore {
    async fn append(&self, event: &Event) -> PersistenceResult<()> {
        let mut line = serde_json::to_string(&PersistedEvent::from_event(event)?)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory and no-op stores
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps persisted rows in memory. Useful for demos and tests.
#[derive(Default)]
pub struct MemoryEventStore {
    rows: Mutex<Vec<PersistedEvent>>,
    failing: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent appends fail with [`PersistenceError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<PersistedEvent> {
        self.rows.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryEventStore {
    async fn append(&self, event: &Event) -> PersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("store marked failing".into()));
        }
        let row = PersistedEvent::from_event(event)?;
        self.rows.lock().push(row);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Discards every event. Used when no event log is configured.
pub struct NoopEventStore;

#[async_trait]
impl PersistenceGateway for NoopEventStore {
    async fn append(&self, _event: &Event) -> PersistenceResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
