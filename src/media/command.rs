//! ffmpeg lookup and command building

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{EngineError, Result};

/// Find the ffmpeg binary
///
/// # Errors
/// Returns error if ffmpeg cannot be found in PATH or common locations
pub fn find_ffmpeg() -> Result<PathBuf> {
    if let Ok(path) = which::which("ffmpeg") {
        return Ok(path);
    }

    // Manual search in common locations
    let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
    let locations = vec![
        PathBuf::from("/usr/bin/ffmpeg"),
        PathBuf::from("/usr/local/bin/ffmpeg"),
        PathBuf::from("/opt/homebrew/bin/ffmpeg"),
        PathBuf::from(home).join(".local/bin/ffmpeg"),
    ];

    for path in locations {
        if path.exists() && path.is_file() {
            return Ok(path);
        }
    }

    Err(EngineError::ffmpeg_not_found())
}

/// Command builder for the ingest process (source -> raw frames on stdout)
pub(crate) struct IngestCommand<'a> {
    pub program: &'a Path,
    pub source: &'a str,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl IngestCommand<'_> {
    /// Build the complete ingest command with stdio wired for piping
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.program);

        cmd.arg("-hide_banner").arg("-loglevel").arg("error");

        // RTSP sources are pulled over TCP; UDP drops whole frames on loss
        if self.source.starts_with("rtsp://") {
            cmd.arg("-rtsp_transport").arg("tcp");
        }

        cmd.arg("-i")
            .arg(self.source)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", self.width, self.height))
            .arg("-r")
            .arg(self.framerate.to_string())
            .arg("-an")
            .arg("pipe:1");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

/// Command builder for the egress process (raw frames on stdin -> destination)
pub(crate) struct EgressCommand<'a> {
    pub program: &'a Path,
    pub destination: &'a str,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

impl EgressCommand<'_> {
    /// Build the complete egress command with stdio wired for piping
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.program);

        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", self.width, self.height))
            .arg("-r")
            .arg(self.framerate.to_string())
            .arg("-i")
            .arg("pipe:0")
            .arg("-c:v")
            .arg("libx264")
            .arg("-preset")
            .arg("ultrafast")
            .arg("-tune")
            .arg("zerolatency")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-f")
            .arg("flv")
            .arg(self.destination);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_command_shapes_args() {
        let cmd = IngestCommand {
            program: Path::new("/usr/bin/ffmpeg"),
            source: "rtsp://cam.local/stream",
            width: 640,
            height: 480,
            framerate: 25,
        }
        .build();

        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"-rtsp_transport".to_string()));
        assert!(args.contains(&"640x480".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn egress_command_targets_destination() {
        let cmd = EgressCommand {
            program: Path::new("/usr/bin/ffmpeg"),
            destination: "rtmp://rtmp-server/live/abc",
            width: 640,
            height: 480,
            framerate: 25,
        }
        .build();

        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("rtmp://rtmp-server/live/abc")
        );
    }

    #[test]
    fn non_rtsp_source_skips_transport_flag() {
        let cmd = IngestCommand {
            program: Path::new("/usr/bin/ffmpeg"),
            source: "/tmp/sample.mp4",
            width: 320,
            height: 240,
            framerate: 10,
        }
        .build();

        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!args.contains(&"-rtsp_transport".to_string()));
    }
}
