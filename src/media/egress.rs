//! Egress process lifecycle

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};

use super::command::EgressCommand;
use super::{TERMINATE_TIMEOUT, spawn_stderr_drain};

/// A running egress process consuming raw frames on its stdin pipe
pub struct EgressProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<()>>,
}

impl EgressProcess {
    /// Spawn the egress process for one stream
    ///
    /// # Errors
    /// Returns [`EngineError::StreamSetup`] if the process fails to start or
    /// the stdin pipe cannot be obtained; a partially started process is
    /// killed before the error returns
    pub fn spawn(
        program: &Path,
        destination: &str,
        width: u32,
        height: u32,
        framerate: u32,
    ) -> Result<Self> {
        let mut cmd = EgressCommand {
            program,
            destination,
            width,
            height,
            framerate,
        }
        .build();

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::stream_setup(format!("egress spawn failed: {e}")))?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.start_kill();
            return Err(EngineError::stream_setup("failed to get egress stdin"));
        };

        let stderr_task = child.stderr.take().map(|s| spawn_stderr_drain("egress", s));

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_task,
        })
    }

    /// Hand the stdin pipe to the frame loop; subsequent calls return `None`
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Close the pipe, give the process a moment to flush, then kill it
    pub async fn terminate(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
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
