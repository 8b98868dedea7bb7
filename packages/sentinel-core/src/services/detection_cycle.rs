//! One detection cycle: directory, worker, normalizer, persistence, broadcast.

use std::sync::Arc;

use crate::directory::{CameraDirectory, CameraRecord, DirectoryError, FallbackCatalog};
use crate::error::ErrorCode;
use crate::services::normalizer::EventNormalizer;
use crate::services::publisher::{EventPublisher, Publication};
use crate::worker::payload::{parse_payload, PayloadError, WorkerPayload};
use crate::worker::{WorkerError, WorkerInvoker};

/// Which branch a cycle ended in.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Detections were aggregated into one event and published.
    DetectionPublished(Publication),
    /// The worker reported an error; a fallback event was published.
    FallbackPublished(Publication),
    /// The worker succeeded but reported no detections.
    NoDetections,
    /// The directory does not know the camera. Ends the session.
    CameraUnresolved,
    /// The worker process could not be started.
    WorkerSpawnFailed(String),
    /// Nonzero exit, signal, timeout or output collection failure.
    WorkerExitFailed {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The worker exited cleanly without printing anything.
    EmptyOutput,
    /// Stdout did not contain a usable JSON object.
    ParseFailed(String),
}

impl CycleOutcome {
    /// Whether the outcome ends the monitoring session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::CameraUnresolved)
    }

    /// The published event, if any.
    pub fn publication(&self) -> Option<&Publication> {
        match self {
            Self::DetectionPublished(p) | Self::FallbackPublished(p) => Some(p),
            _ => None,
        }
    }
}

/// Runs detection cycles for any camera.
///
/// Holds no per-camera state; every cycle re-resolves the camera record.
pub struct DetectionCycleRunner {
    directory: Arc<dyn CameraDirectory>,
    fallback: FallbackCatalog,
    worker: Arc<dyn WorkerInvoker>,
    normalizer: EventNormalizer,
    publisher: Arc<EventPublisher>,
}

impl DetectionCycleRunner {
    pub fn new(
        directory: Arc<dyn CameraDirectory>,
        fallback: FallbackCatalog,
        worker: Arc<dyn WorkerInvoker>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            directory,
            fallback,
            worker,
            normalizer: EventNormalizer::new(),
            publisher,
        }
    }

    /// Resolves the camera, consulting the fallback catalog when the directory
    /// is unavailable. `None` means the directory answered NotFound.
    async fn resolve_camera(&self, camera_id: &str) -> Option<CameraRecord> {
        match self.directory.lookup(camera_id).await {
            Ok(record) => Some(record),
            Err(DirectoryError::NotFound(_)) => None,
            Err(e @ DirectoryError::Unavailable(_)) => {
                log::warn!(
                    "[Detection] Directory lookup for {} failed ({}), using fallback catalog: {}",
                    camera_id,
                    e.code(),
                    e
                );
                Some(self.fallback.resolve(camera_id))
            }
        }
    }

    /// Executes one cycle for the camera.
    pub async fn run(&self, camera_id: &str) -> CycleOutcome {
        let Some(camera) = self.resolve_camera(camera_id).await else {
            log::error!("[Detection] Camera {} not found, aborting cycle", camera_id);
            return CycleOutcome::CameraUnresolved;
        };

        let output = match self.worker.invoke(&camera.id, &camera.stream_url).await {
            Ok(output) => output,
            Err(e @ WorkerError::Spawn(_)) => {
                log::error!("[Detection] Worker for {} ({}): {}", camera.id, e.code(), e);
                return CycleOutcome::WorkerSpawnFailed(e.to_string());
            }
            Err(e) => {
                log::error!("[Detection] Worker for {} ({}): {}", camera.id, e.code(), e);
                return CycleOutcome::WorkerExitFailed {
                    exit_code: None,
                    stderr: e.to_string(),
                };
            }
        };

        if !output.success() {
            log::error!(
                "[Detection] Worker for {} exited with {:?}: {}",
                camera.id,
                output.exit_code,
                output.stderr.trim()
            );
            return CycleOutcome::WorkerExitFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            };
        }

        let payload = match parse_payload(&output.stdout) {
            Ok(payload) => payload,
            Err(PayloadError::Empty) => {
                log::warn!("[Detection] Worker for {} produced no output", camera.id);
                return CycleOutcome::EmptyOutput;
            }
            Err(e) => {
                log::error!(
                    "[Detection] Could not parse worker output for {} ({}): {}. Raw output: {}",
                    camera.id,
                    e.code(),
                    e,
                    output.stdout.trim()
                );
                return CycleOutcome::ParseFailed(e.to_string());
            }
        };

        match payload {
            WorkerPayload::Error(message) => {
                log::warn!(
                    "[Detection] Worker reported error for {}: {}. Emitting fallback event",
                    camera.id,
                    message
                );
                let event = self.normalizer.fallback_event(&camera);
                let publication = self.publisher.publish(event).await;
                log::info!(
                    "[Detection] Fallback event for {} published to {} client(s)",
                    camera.id,
                    publication.delivered
                );
                CycleOutcome::FallbackPublished(publication)
            }
            WorkerPayload::Detections {
                detections,
                image_url,
            } => match self
                .normalizer
                .detection_event(&camera, &detections, image_url)
            {
                Some(event) => {
                    let publication = self.publisher.publish(event).await;
                    log::info!(
                        "[Detection] {} detection(s) on {} published to {} client(s)",
                        detections.len(),
                        camera.id,
                        publication.delivered
                    );
                    CycleOutcome::DetectionPublished(publication)
                }
                None => {
                    log::debug!("[Detection] No detections on {}", camera.id);
                    CycleOutcome::NoDetections
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fakes shared by the service tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::directory::{CameraDirectory, CameraRecord, DirectoryError, DirectoryResult};
    use crate::events::{BroadcastMessage, Broadcaster};
    use crate::worker::{WorkerError, WorkerInvoker, WorkerOutput};

    /// Directory returning a scripted answer for every lookup.
    pub struct ScriptedDirectory {
        pub answer: Mutex<DirectoryResult<CameraRecord>>,
    }

    impl ScriptedDirectory {
        pub fn found(record: CameraRecord) -> Self {
            Self {
                answer: Mutex::new(Ok(record)),
            }
        }

        pub fn failing(err: DirectoryError) -> Self {
            Self {
                answer: Mutex::new(Err(err)),
            }
        }
    }

    #[async_trait]
    impl CameraDirectory for ScriptedDirectory {
        async fn lookup(&self, _camera_id: &str) -> DirectoryResult<CameraRecord> {
            self.answer.lock().clone()
        }

        async fn random_online(&self) -> DirectoryResult<Option<CameraRecord>> {
            self.answer.lock().clone().map(Some)
        }
    }

    /// Worker replaying canned outputs; repeats the last one when exhausted.
    pub struct ScriptedWorker {
        outputs: Mutex<VecDeque<WorkerOutput>>,
        last: Mutex<WorkerOutput>,
        pub calls: AtomicUsize,
        pub invoked_with: Mutex<Vec<(String, String)>>,
        pub delay: Option<std::time::Duration>,
    }

    impl ScriptedWorker {
        pub fn new(outputs: Vec<WorkerOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
                last: Mutex::new(WorkerOutput::default()),
                calls: AtomicUsize::new(0),
                invoked_with: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        pub fn stdout(text: &str) -> Self {
            Self::new(vec![ok(text)])
        }

        pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub fn ok(stdout: &str) -> WorkerOutput {
        WorkerOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[async_trait]
    impl WorkerInvoker for ScriptedWorker {
        async fn invoke(
            &self,
            camera_id: &str,
            stream_locator: &str,
        ) -> Result<WorkerOutput, WorkerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.invoked_with
                .lock()
                .push((camera_id.to_string(), stream_locator.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.outputs.lock().pop_front();
            let output = match next {
                Some(output) => {
                    *self.last.lock() = output.clone();
                    output
                }
                None => self.last.lock().clone(),
            };
            Ok(output)
        }
    }

    /// Worker that always fails to spawn.
    pub struct UnspawnableWorker;

    #[async_trait]
    impl WorkerInvoker for UnspawnableWorker {
        async fn invoke(&self, _: &str, _: &str) -> Result<WorkerOutput, WorkerError> {
            Err(WorkerError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            )))
        }
    }

    /// Broadcaster recording every message.
    #[derive(Default)]
    pub struct RecordingBroadcaster {
        pub messages: Mutex<Vec<BroadcastMessage>>,
    }

    impl RecordingBroadcaster {
        pub fn count(&self) -> usize {
            self.messages.lock().len()
        }
    }

    impl Broadcaster for RecordingBroadcaster {
        fn broadcast(&self, message: &BroadcastMessage) -> usize {
            self.messages.lock().push(message.clone());
            1
        }
    }
}
