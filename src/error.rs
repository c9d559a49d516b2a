//! Error types for the vistream engine

use thiserror::Error;

/// Main error type for the vistream engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// A session with the requested id is already registered
    #[error("session already started: {0}")]
    AlreadyExists(String),

    /// ffmpeg binary not found or not installed
    #[error("ffmpeg not found: {0}")]
    FfmpegNotFound(String),

    /// Ingest/egress process spawn or pipe wiring failure
    #[error("stream setup failed: {0}")]
    StreamSetup(String),

    /// Detection backend request failed (transport, status, or rejection)
    #[error("detection failed: {0}")]
    Detect(String),

    /// JSON decode error when parsing a backend response
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Configuration file parse error
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout error
    #[error("timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create an ffmpeg-not-found error
    #[must_use]
    pub fn ffmpeg_not_found() -> Self {
        Self::FfmpegNotFound(
            "ffmpeg not found in PATH or common locations.\n\
             Install it with your package manager, e.g.:\n\
             apt install ffmpeg\n\
             \n\
             Or set `ffmpeg-path` in the engine configuration"
                .to_string(),
        )
    }

    /// Create a stream setup error
    pub fn stream_setup(msg: impl Into<String>) -> Self {
        Self::StreamSetup(msg.into())
    }

    /// Create a detection error
    pub fn detect(msg: impl Into<String>) -> Self {
        Self::Detect(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
