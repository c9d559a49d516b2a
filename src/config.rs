//! Engine configuration
//!
//! Configuration is loaded from a TOML file with kebab-case keys. Every field
//! has a serde default so a partial file (or none at all) still yields a
//! usable configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Top-level configuration file shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Engine section
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Engine configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Detection backend URL, e.g. `http://127.0.0.1:8000/detect`
    pub detect_ai_url: String,

    /// Reach the detection backend over a Unix domain socket instead of TCP
    pub unix_socket: bool,

    /// Unix socket path used when `unix-socket` is enabled
    pub socket_path: String,

    /// Timeout for one detection backend request, in seconds
    pub detect_timeout_secs: u64,

    /// Health sweep interval, in seconds
    pub health_interval_secs: u64,

    /// Capacity of the close-notification queue
    pub close_queue_capacity: usize,

    /// Capacity of the per-session detection sample queue
    pub sample_queue_capacity: usize,

    /// Detection sampling rate, frames per second
    pub samples_per_second: u32,

    /// JPEG quality used for detection payloads (1-100)
    pub jpeg_quality: u8,

    /// Prefix of the internal publish URL, e.g. `rtmp://rtmp-server/live/`
    pub push_url_internal_pre: String,

    /// Prefix of the publicly reachable playback URL
    pub push_url_public_pre: String,

    /// Explicit ffmpeg binary path; searched in PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detect_ai_url: "http://127.0.0.1:8000/detect".to_string(),
            unix_socket: false,
            socket_path: "/tmp/vistream-detect.sock".to_string(),
            detect_timeout_secs: 5,
            health_interval_secs: 10,
            close_queue_capacity: 128,
            sample_queue_capacity: 32,
            samples_per_second: 5,
            jpeg_quality: 85,
            push_url_internal_pre: "rtmp://127.0.0.1/live/".to_string(),
            push_url_public_pre: "rtmp://127.0.0.1/live/".to_string(),
            ffmpeg_path: None,
        }
    }
}

impl EngineConfig {
    /// Interval between two detection samples
    #[must_use]
    pub fn sample_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.samples_per_second.max(1)))
    }

    /// Timeout for one detection backend request
    #[must_use]
    pub fn detect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.detect_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.samples_per_second, 5);
        assert_eq!(cfg.sample_interval(), std::time::Duration::from_millis(200));
        assert_eq!(cfg.close_queue_capacity, 128);
        assert!(!cfg.unix_socket);
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [engine]
            detect-ai-url = "http://10.0.0.2:9000/detect"
            unix-socket = true
            socket-path = "/run/detect.sock"
            samples-per-second = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.engine.detect_ai_url, "http://10.0.0.2:9000/detect");
        assert!(cfg.engine.unix_socket);
        assert_eq!(cfg.engine.socket_path, "/run/detect.sock");
        assert_eq!(
            cfg.engine.sample_interval(),
            std::time::Duration::from_millis(100)
        );
        // untouched fields keep their defaults
        assert_eq!(cfg.engine.jpeg_quality, 85);
    }
}
