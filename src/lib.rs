//! # vistream
//!
//! A live-video session engine. Each session pulls a source stream through
//! an ingest process, overlays the latest object-detection results onto the
//! frames, and re-publishes the annotated stream through an egress process.
//! Detection runs asynchronously: frames are sampled at a fixed rate, sent
//! to an external detection backend, and the returned boxes are drawn onto
//! subsequent frames; the pipeline never waits for a detection round-trip.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vistream::{Config, CreateSessionRequest, SessionManager, StreamSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("video_detect.toml")?;
//!     let manager = Arc::new(SessionManager::from_config(config.engine)?);
//!
//!     let desc = manager
//!         .create_session(CreateSessionRequest {
//!             id: "cam1".to_string(),
//!             source_url: "rtsp://127.0.0.1:8554/cam1".to_string(),
//!             settings: StreamSettings {
//!                 width: 640,
//!                 height: 480,
//!                 framerate: 25,
//!             },
//!         })
//!         .await?;
//!     log::info!("publishing at {}", desc.push_url_public);
//!
//!     manager.enable_detection("cam1");
//!     // ...
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`manager`]: session registry, pool, background reclamation, shutdown
//! - [`session`]: per-stream state machine, frame loop, detection loop
//! - [`media`]: ffmpeg ingest/egress subprocess lifecycle
//! - [`detect`]: detection backend clients (TCP or Unix socket)
//! - [`codec`]: raw frame decode, overlay drawing, JPEG encode
//! - [`config`]: TOML configuration
//! - [`error`]: error types and handling
//!
//! ## Concurrency Model
//!
//! Per session, exactly two long-lived tasks: the frame loop and the
//! detection loop, joined by a supervisor that contains faults and reports
//! closure exactly once. Per manager, two background tasks: the close-drain
//! and the health sweep. Sessions never share locks with each other, so
//! they scale independently; cancellation flows down a token tree from the
//! manager to every session.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod detect;
pub mod error;
pub mod manager;
pub mod media;
pub mod session;

// Re-export commonly used types for external API
pub use config::{Config, EngineConfig};
pub use detect::{DetectBackend, DetectionBox, HttpBackend, UnixSocketBackend};
pub use error::{EngineError, Result};
pub use manager::{CreateSessionRequest, SessionManager};
pub use session::{ResultCache, Session, SessionDescriptor, SessionState, StreamSettings};

/// Version of the engine crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
