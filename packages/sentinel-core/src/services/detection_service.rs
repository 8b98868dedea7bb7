//! Per-camera monitoring sessions.
//!
//! `start` registers a session and spawns its loop: one detection cycle right
//! away, then one cycle after each randomized delay. Cycles of one session run
//! back to back and never overlap. `stop` cancels future cycles only; a cycle
//! already in flight runs to completion and may still broadcast.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::IntervalRange;
use crate::error::{SentinelError, SentinelResult};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::detection_cycle::DetectionCycleRunner;
use crate::services::session_registry::{SessionInfo, SessionRegistry, SessionTicket};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Owns the session registry and the recurring detection loops.
pub struct DetectionService {
    sessions: Arc<SessionRegistry>,
    runner: Arc<DetectionCycleRunner>,
    interval: IntervalRange,
    spawner: TokioSpawner,
    /// Parent of every session token.
    cancel: CancellationToken,
}

impl DetectionService {
    pub fn new(
        runner: Arc<DetectionCycleRunner>,
        interval: IntervalRange,
        spawner: TokioSpawner,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionRegistry::new()),
            runner,
            interval,
            spawner,
            cancel,
        }
    }

    /// Starts monitoring a camera. Idempotent per camera id.
    ///
    /// Returns immediately; the first cycle runs on the spawned session task.
    pub fn start(&self, camera_id: &str) -> SentinelResult<StartOutcome> {
        let camera_id = camera_id.trim();
        if camera_id.is_empty() {
            return Err(SentinelError::InvalidRequest(
                "cameraId is required".to_string(),
            ));
        }

        if self.cancel.is_cancelled() {
            log::warn!("[Detection] Refusing to start {} during shutdown", camera_id);
            return Err(SentinelError::ShuttingDown);
        }

        let Some(ticket) = self.sessions.try_insert(camera_id, &self.cancel) else {
            log::info!("[Detection] Analysis already running for {}", camera_id);
            return Ok(StartOutcome::AlreadyRunning);
        };

        log::info!("[Detection] Starting analysis for {}", camera_id);
        self.spawner.spawn(run_session(
            Arc::clone(&self.sessions),
            Arc::clone(&self.runner),
            self.interval,
            camera_id.to_string(),
            ticket,
        ));
        Ok(StartOutcome::Started)
    }

    /// Stops monitoring a camera. Returns whether a session existed.
    pub fn stop(&self, camera_id: &str) -> SentinelResult<bool> {
        let camera_id = camera_id.trim();
        if camera_id.is_empty() {
            return Err(SentinelError::InvalidRequest(
                "cameraId is required".to_string(),
            ));
        }
        let stopped = self.sessions.remove(camera_id);
        if stopped {
            log::info!("[Detection] Stopped analysis for {}", camera_id);
        } else {
            log::debug!("[Detection] Stop for {} ignored, no active session", camera_id);
        }
        Ok(stopped)
    }

    /// Stops every session. Used at shutdown.
    pub fn stop_all(&self) -> usize {
        let count = self.sessions.clear();
        if count > 0 {
            log::info!("[Detection] Stopped {} session(s)", count);
        }
        count
    }

    pub fn is_active(&self, camera_id: &str) -> bool {
        self.sessions.contains(camera_id)
    }

    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.snapshot()
    }
}

async fn run_session(
    sessions: Arc<SessionRegistry>,
    runner: Arc<DetectionCycleRunner>,
    interval: IntervalRange,
    camera_id: String,
    ticket: SessionTicket,
) {
    loop {
        let outcome = runner.run(&camera_id).await;
        log::debug!("[Detection] Cycle for {} finished: {:?}", camera_id, outcome);

        if outcome.is_session_fatal() {
            if sessions.remove_generation(&camera_id, ticket.generation) {
                log::warn!(
                    "[Detection] Camera {} could not be resolved, session stopped",
                    camera_id
                );
            }
            return;
        }

        if ticket.cancel.is_cancelled() {
            break;
        }

        let delay = interval.sample();
        tokio::select! {
            _ = ticket.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    // A cancelled parent token leaves the entry behind; drop it unless a newer
    // session already replaced it.
    sessions.remove_generation(&camera_id, ticket.generation);
    log::debug!("[Detection] Session loop for {} exited", camera_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{CameraRecord, DirectoryError, FallbackCatalog};
    use crate::persistence::MemoryEventStore;
    use crate::services::detection_cycle::test_support::*;
    use crate::services::publisher::EventPublisher;
    use std::time::Duration;

    const PERSON: &str = r#"{"detections":[{"class":"person","confidence":0.92}]}"#;

    struct Harness {
        service: DetectionService,
        worker: Arc<ScriptedWorker>,
        broadcaster: Arc<RecordingBroadcaster>,
        cancel: CancellationToken,
    }

    fn harness_with(directory: ScriptedDirectory, worker: ScriptedWorker) -> Harness {
        let worker = Arc::new(worker);
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let publisher = Arc::new(EventPublisher::new(
            Arc::new(MemoryEventStore::new()),
            broadcaster.clone(),
        ));
        let runner = Arc::new(DetectionCycleRunner::new(
            Arc::new(directory),
            FallbackCatalog::builtin(),
            worker.clone(),
            publisher,
        ));
        let cancel = CancellationToken::new();
        let service = DetectionService::new(
            runner,
            IntervalRange::fixed(5000),
            TokioSpawner::current(),
            cancel.clone(),
        );
        Harness {
            service,
            worker,
            broadcaster,
            cancel,
        }
    }

    fn harness(worker: ScriptedWorker) -> Harness {
        let camera = CameraRecord::new("CAM-0001", "Gate", "North", "oil_gas", "rtsp://gate");
        harness_with(ScriptedDirectory::found(camera), worker)
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_keeps_one_session() {
        let h = harness(ScriptedWorker::stdout(PERSON));

        assert_eq!(h.service.start("CAM-0001").unwrap(), StartOutcome::Started);
        assert_eq!(
            h.service.start("CAM-0001").unwrap(),
            StartOutcome::AlreadyRunning
        );
        assert_eq!(h.service.active_sessions().len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Only one loop was spawned, so only one immediate cycle ran.
        assert_eq!(h.worker.call_count(), 1);
    }

    #[tokio::test]
    async fn stop_without_session_is_noop() {
        let h = harness(ScriptedWorker::stdout(PERSON));
        assert!(!h.service.stop("CAM-0001").unwrap());
        assert!(h.service.active_sessions().is_empty());
    }

    #[tokio::test]
    async fn blank_camera_id_is_rejected() {
        let h = harness(ScriptedWorker::stdout(PERSON));
        assert!(matches!(
            h.service.start("  "),
            Err(SentinelError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.service.stop(""),
            Err(SentinelError::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_repeat_on_interval_until_stopped() {
        let h = harness(ScriptedWorker::stdout(PERSON));
        h.service.start("CAM-0001").unwrap();

        // Cycles at t = 0s, 5s and 10s.
        tokio::time::sleep(Duration::from_millis(11_000)).await;
        assert_eq!(h.worker.call_count(), 3);
        assert_eq!(h.broadcaster.count(), 3);

        assert!(h.service.stop("CAM-0001").unwrap());
        assert!(!h.service.is_active("CAM-0001"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.worker.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_cycle_completes_after_stop() {
        let h = harness(ScriptedWorker::stdout(PERSON).with_delay(Duration::from_secs(2)));
        h.service.start("CAM-0001").unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.worker.call_count(), 1);
        assert_eq!(h.broadcaster.count(), 0);

        h.service.stop("CAM-0001").unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        // The running cycle still broadcast; no further cycle was started.
        assert_eq!(h.broadcaster.count(), 1);
        assert_eq!(h.worker.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_camera_ends_session() {
        let h = harness_with(
            ScriptedDirectory::failing(DirectoryError::NotFound("CAM-0404".into())),
            ScriptedWorker::stdout(PERSON),
        );
        h.service.start("CAM-0404").unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!h.service.is_active("CAM-0404"));
        assert_eq!(h.worker.call_count(), 0);

        // A new start is accepted once the failed session is gone.
        assert_eq!(h.service.start("CAM-0404").unwrap(), StartOutcome::Started);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_failures_do_not_end_session() {
        let h = harness(ScriptedWorker::stdout("not json at all"));
        h.service.start("CAM-0001").unwrap();

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(h.worker.call_count(), 2);
        assert!(h.service.is_active("CAM-0001"));
        assert_eq!(h.broadcaster.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_all_loops() {
        let h = harness(ScriptedWorker::stdout(PERSON));
        h.service.start("CAM-0001").unwrap();
        h.service.start("CAM-0002").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.worker.call_count(), 2);

        h.cancel.cancel();
        assert_eq!(h.service.stop_all(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.worker.call_count(), 2);
    }

    #[tokio::test]
    async fn start_after_parent_cancellation_is_refused() {
        let h = harness(ScriptedWorker::stdout(PERSON));
        h.cancel.cancel();

        assert!(matches!(
            h.service.start("CAM-0001"),
            Err(SentinelError::ShuttingDown)
        ));
        assert!(h.service.active_sessions().is_empty());
        assert_eq!(h.worker.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_alone_clears_registry() {
        let h = harness(ScriptedWorker::stdout(PERSON));
        h.service.start("CAM-0001").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.service.is_active("CAM-0001"));

        h.cancel.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!h.service.is_active("CAM-0001"));
        assert!(h.service.active_sessions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exited_loop_does_not_remove_restarted_session() {
        let h = harness(ScriptedWorker::stdout(PERSON).with_delay(Duration::from_secs(2)));
        h.service.start("CAM-0001").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        // The first loop is still inside its cycle when the camera restarts.
        h.service.stop("CAM-0001").unwrap();
        assert_eq!(h.service.start("CAM-0001").unwrap(), StartOutcome::Started);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(h.service.is_active("CAM-0001"));
    }
}
