//! Media subprocess transport
//!
//! Each session owns two external ffmpeg processes: an ingest process that
//! pulls the source stream and emits fixed-size raw RGB frames on stdout,
//! and an egress process that consumes the same raw frames on stdin and
//! publishes the encoded stream to the destination. This module spawns the
//! processes, wires their pipes, drains their stderr, and terminates them.
//!
//! # Module Structure
//!
//! - `command` - ffmpeg binary lookup and argument building
//! - `ingest` - source-side process (stdout pipe)
//! - `egress` - destination-side process (stdin pipe)

mod command;
mod egress;
mod ingest;

pub use command::find_ffmpeg;
pub use egress::EgressProcess;
pub use ingest::IngestProcess;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;

/// Grace period before a lingering process is killed
pub(crate) const TERMINATE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Consume a child's stderr so the process can never block on it
///
/// ffmpeg chatters on stderr; the lines are forwarded to the log at debug
/// level instead of inheriting the parent's terminal.
pub(crate) fn spawn_stderr_drain(role: &'static str, stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!("[ffmpeg {role}] {line}");
        }
    })
}
