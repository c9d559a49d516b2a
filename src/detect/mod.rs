//! Detection backend client
//!
//! The engine sends sampled JPEG frames to an external object-detection
//! service and receives bounding boxes back. Two transports are supported,
//! selected by configuration:
//!
//! - `backend::HttpBackend` - plain HTTP over TCP (reqwest)
//! - `backend::UnixSocketBackend` - HTTP over a Unix domain socket, which
//!   avoids TCP overhead when the service runs on the same host
//!
//! Both sit behind the [`DetectBackend`] trait so tests (and alternative
//! deployments) can substitute their own implementation.

mod backend;
mod types;

pub use backend::{DetectBackend, HttpBackend, UnixSocketBackend, backend_from_config};
pub use types::DetectionBox;
