//! Shared fixtures for engine integration tests
//!
//! Real ffmpeg is not available (or wanted) in the test environment, so the
//! manager is pointed at a small shell script that plays both roles: when
//! invoked with ingest-shaped arguments (last argument `pipe:1`) it emits
//! raw frames on stdout; otherwise it consumes stdin like an egress process.

#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use vistream::{DetectBackend, DetectionBox, EngineConfig, StreamSettings};

/// Test frame geometry: 16x16 RGB = 768 bytes per frame
pub const FRAME_BYTES: usize = 16 * 16 * 3;

/// Stream settings matching [`FRAME_BYTES`]
pub fn test_settings() -> StreamSettings {
    StreamSettings {
        width: 16,
        height: 16,
        framerate: 10,
    }
}

/// How the stub ingest side behaves
pub enum StubMode {
    /// Emit this many frames, then EOF (source gone)
    Finite(usize),
    /// Emit frames at ~50 fps until killed
    Endless,
}

/// Write the stub ffmpeg script and return its path
pub fn write_stub_ffmpeg(dir: &Path, mode: StubMode) -> PathBuf {
    let ingest_body = match mode {
        StubMode::Finite(frames) => {
            format!("exec head -c {} /dev/zero", FRAME_BYTES * frames)
        }
        StubMode::Endless => format!(
            "while :; do head -c {FRAME_BYTES} /dev/zero || exit 0; sleep 0.02; done"
        ),
    };
    let script = format!(
        "#!/bin/sh\n\
         for last; do :; done\n\
         if [ \"$last\" = \"pipe:1\" ]; then\n\
           {ingest_body}\n\
         else\n\
           exec cat > /dev/null\n\
         fi\n"
    );

    let path = dir.join("ffmpeg-stub");
    std::fs::write(&path, script).expect("write stub");

    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&path).expect("stat stub").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod stub");

    path
}

/// Engine configuration wired for fast, hermetic tests
pub fn test_config(ffmpeg: PathBuf) -> EngineConfig {
    EngineConfig {
        ffmpeg_path: Some(ffmpeg),
        samples_per_second: 100,
        health_interval_secs: 1,
        detect_timeout_secs: 2,
        ..EngineConfig::default()
    }
}

/// Backend that always returns one "person" box
pub struct OneBoxBackend;

/// The box [`OneBoxBackend`] returns
pub fn expected_box() -> DetectionBox {
    DetectionBox {
        x1: 10,
        y1: 10,
        x2: 50,
        y2: 50,
        label: "person".to_string(),
        conf: 0.9,
    }
}

impl DetectBackend for OneBoxBackend {
    fn detect<'a>(
        &'a self,
        _payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = vistream::Result<Vec<DetectionBox>>> + Send + 'a>> {
        Box::pin(async { Ok(vec![expected_box()]) })
    }
}

/// Backend that always fails; the cache must keep its previous contents
pub struct FailingBackend;

impl DetectBackend for FailingBackend {
    fn detect<'a>(
        &'a self,
        _payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = vistream::Result<Vec<DetectionBox>>> + Send + 'a>> {
        Box::pin(async { Err(vistream::EngineError::detect("backend down")) })
    }
}

/// Poll a condition until it holds or the timeout elapses
pub async fn wait_for<F>(mut cond: F, timeout: std::time::Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
