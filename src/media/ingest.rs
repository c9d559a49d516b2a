//! Ingest process lifecycle

use std::path::Path;

use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};

use super::command::IngestCommand;
use super::{TERMINATE_TIMEOUT, spawn_stderr_drain};

/// A running ingest process producing raw frames on its stdout pipe
pub struct IngestProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
}

impl IngestProcess {
    /// Spawn the ingest process for one stream
    ///
    /// # Errors
    /// Returns [`EngineError::StreamSetup`] if the process fails to start or
    /// the stdout pipe cannot be obtained; a partially started process is
    /// killed before the error returns
    pub fn spawn(
        program: &Path,
        source: &str,
        width: u32,
        height: u32,
        framerate: u32,
    ) -> Result<Self> {
        let mut cmd = IngestCommand {
            program,
            source,
            width,
            height,
            framerate,
        }
        .build();

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::stream_setup(format!("ingest spawn failed: {e}")))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.start_kill();
            return Err(EngineError::stream_setup("failed to get ingest stdout"));
        };

        let stderr_task = child.stderr.take().map(|s| spawn_stderr_drain("ingest", s));

        Ok(Self {
            child,
            stdout: Some(stdout),
            stderr_task,
        })
    }

    /// Hand the stdout pipe to the frame loop; subsequent calls return `None`
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Kill the process and await its exit
    pub async fn terminate(&mut self) {
        self.stdout = None;
        let _ = self.child.start_kill();
        if tokio::time::timeout(TERMINATE_TIMEOUT, self.child.wait())
            .await
            .is_err()
        {
            let _ = self.child.kill().await;
            let _ = self.child.wait().await;
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
