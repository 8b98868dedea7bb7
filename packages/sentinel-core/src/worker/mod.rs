//! External inference worker invocation.
//!
//! A worker is an independent OS process invoked as
//! `<executable> [args...] <cameraId> <streamLocator>`. Its stdout and stderr are
//! captured in full; exit code 0 means the output is usable. See [`payload`] for
//! interpreting stdout.

pub mod payload;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::WorkerConfig;

/// Errors raised while running a worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The process could not be started.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process started but collecting its output failed.
    #[error("failed to collect worker output: {0}")]
    Wait(#[source] std::io::Error),

    /// The process exceeded its deadline and was killed.
    #[error("worker timed out after {0:?}")]
    Timeout(Duration),
}

/// Captured result of one worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl WorkerOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for running the inference worker for one camera.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke(&self, camera_id: &str, stream_locator: &str)
        -> Result<WorkerOutput, WorkerError>;
}

/// Runs the worker as a child process.
pub struct ProcessWorker {
    executable: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessWorker {
    pub fn new(executable: impl Into<String>, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            executable: executable.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.executable.clone(), config.args.clone(), config.timeout())
    }

    fn command(&self, camera_id: &str, stream_locator: &str) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .arg(camera_id)
            .arg(stream_locator)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl WorkerInvoker for ProcessWorker {
    async fn invoke(
        &self,
        camera_id: &str,
        stream_locator: &str,
    ) -> Result<WorkerOutput, WorkerError> {
        log::debug!(
            "[Worker] Spawning {} for camera {} ({})",
            self.executable,
            camera_id,
            stream_locator
        );

        let child = self
            .command(camera_id, stream_locator)
            .spawn()
            .map_err(WorkerError::Spawn)?;

        // Dropping the wait future on timeout drops the child, and kill_on_drop
        // sends SIGKILL.
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| WorkerError::Timeout(limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(WorkerError::Wait)?;

        let output = WorkerOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.stderr.trim().is_empty() {
            log::debug!("[Worker] {} stderr: {}", camera_id, output.stderr.trim());
        }
        Ok(output)
    }
}
