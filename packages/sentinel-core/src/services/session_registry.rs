//! Registry of cameras under active monitoring.
//!
//! At most one [`MonitoringSession`] exists per camera id. Each session owns a
//! cancellation token that stops its recurring timer, plus a generation number
//! so a session loop that ends on its own only removes its own entry, never a
//! newer session started for the same camera.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Recurring detection schedule for one camera.
struct MonitoringSession {
    session_id: String,
    generation: u64,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

/// Public view of an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub camera_id: String,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

/// Handle returned when a new session is registered.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub generation: u64,
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, MonitoringSession>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session unless one already exists for the camera.
    ///
    /// The session token is a child of `parent`, so cancelling the parent stops
    /// every session at once.
    pub fn try_insert(&self, camera_id: &str, parent: &CancellationToken) -> Option<SessionTicket> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(camera_id) {
            return None;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = parent.child_token();
        sessions.insert(
            camera_id.to_string(),
            MonitoringSession {
                session_id: Uuid::new_v4().to_string(),
                generation,
                cancel: cancel.clone(),
                started_at: Utc::now(),
            },
        );
        Some(SessionTicket { generation, cancel })
    }

    /// Removes and cancels the camera's session. Returns whether one existed.
    pub fn remove(&self, camera_id: &str) -> bool {
        let removed = self.sessions.lock().remove(camera_id);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes the camera's session only if it is still the given generation.
    pub fn remove_generation(&self, camera_id: &str, generation: u64) -> bool {
        let mut sessions = self.sessions.lock();
        let matches = sessions
            .get(camera_id)
            .is_some_and(|s| s.generation == generation);
        if !matches {
            return false;
        }
        if let Some(session) = sessions.remove(camera_id) {
            session.cancel.cancel();
        }
        true
    }

    pub fn contains(&self, camera_id: &str) -> bool {
        self.sessions.lock().contains_key(camera_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Active sessions sorted by camera id.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .lock()
            .iter()
            .map(|(camera_id, s)| SessionInfo {
                camera_id: camera_id.clone(),
                session_id: s.session_id.clone(),
                started_at: s.started_at,
            })
            .collect();
        infos.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        infos
    }

    /// Cancels and removes every session. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<MonitoringSession> =
            self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.cancel.cancel();
        }
        drained.len()
    }
}
