//! Detection backend transports
//!
//! [`HttpBackend`] talks to the detection service over TCP; the
//! [`UnixSocketBackend`] reaches the same HTTP interface through a Unix
//! domain socket. Both bound every request with a timeout so a hung backend
//! cannot pin a session's detection loop.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyperlocal::{UnixClientExt, UnixConnector};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

use super::types::{DetectionBox, parse_detect_response};

/// A detection service the engine can submit encoded frames to
///
/// Implementations must be cheap to share across sessions; one backend
/// instance serves every session of a manager.
pub trait DetectBackend: Send + Sync {
    /// Submit one encoded image payload and return the detected boxes
    ///
    /// Any failure (transport, non-success status, rejection by the service,
    /// timeout) is returned as an error; callers keep their previous results.
    fn detect<'a>(
        &'a self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DetectionBox>>> + Send + 'a>>;
}

/// Build the backend selected by the engine configuration
pub fn backend_from_config(cfg: &EngineConfig) -> Result<Arc<dyn DetectBackend>> {
    if cfg.unix_socket {
        Ok(Arc::new(UnixSocketBackend::new(
            &cfg.socket_path,
            endpoint_path(&cfg.detect_ai_url),
            cfg.detect_timeout(),
        )))
    } else {
        Ok(Arc::new(HttpBackend::new(
            &cfg.detect_ai_url,
            cfg.detect_timeout(),
        )?))
    }
}

/// Extract the request path from a configured detection URL
fn endpoint_path(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        parsed.path().to_string()
    } else if url.starts_with('/') {
        url.to_string()
    } else {
        "/detect".to_string()
    }
}

// ============================================================================
// TCP TRANSPORT
// ============================================================================

/// Detection backend reached over plain HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpBackend {
    /// Create a backend for the given URL with a per-request timeout
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| EngineError::invalid_config(format!("bad detect url {url:?}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::invalid_config(format!("http client build failed: {e}")))?;
        Ok(Self { client, url })
    }
}

impl DetectBackend for HttpBackend {
    fn detect<'a>(
        &'a self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DetectionBox>>> + Send + 'a>> {
        Box::pin(async move {
            if payload.is_empty() {
                return Err(EngineError::detect("empty image payload"));
            }

            let resp = self
                .client
                .post(self.url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(payload.to_vec())
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        EngineError::timeout(format!("detection request: {e}"))
                    } else {
                        EngineError::detect(format!("request failed: {e}"))
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(EngineError::detect(format!(
                    "backend returned {status}: {body}"
                )));
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| EngineError::detect(format!("response read failed: {e}")))?;
            parse_detect_response(&body)
        })
    }
}

// ============================================================================
// UNIX SOCKET TRANSPORT
// ============================================================================

/// Detection backend reached via HTTP over a Unix domain socket
///
/// Avoids TCP connection overhead when the detection service runs on the
/// same host behind a uvicorn-style socket.
pub struct UnixSocketBackend {
    client: Client<UnixConnector, Full<Bytes>>,
    socket_path: PathBuf,
    endpoint: String,
    timeout: Duration,
}

impl UnixSocketBackend {
    /// Create a backend for the given socket path and request path
    pub fn new(socket_path: impl Into<PathBuf>, endpoint: String, timeout: Duration) -> Self {
        Self {
            client: Client::unix(),
            socket_path: socket_path.into(),
            endpoint,
            timeout,
        }
    }
}

impl DetectBackend for UnixSocketBackend {
    fn detect<'a>(
        &'a self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DetectionBox>>> + Send + 'a>> {
        Box::pin(async move {
            if payload.is_empty() {
                return Err(EngineError::detect("empty image payload"));
            }

            let uri: hyper::Uri = hyperlocal::Uri::new(&self.socket_path, &self.endpoint).into();
            let req = hyper::Request::post(uri)
                .header(hyper::header::CONTENT_TYPE, "application/octet-stream")
                .body(Full::new(Bytes::copy_from_slice(payload)))
                .map_err(|e| EngineError::detect(format!("request build failed: {e}")))?;

            let resp = tokio::time::timeout(self.timeout, self.client.request(req))
                .await
                .map_err(|_| {
                    EngineError::timeout(format!(
                        "detection request exceeded {}s",
                        self.timeout.as_secs()
                    ))
                })?
                .map_err(|e| EngineError::detect(format!("socket request failed: {e}")))?;

            let status = resp.status();
            let body = tokio::time::timeout(self.timeout, resp.into_body().collect())
                .await
                .map_err(|_| EngineError::timeout("detection response read".to_string()))?
                .map_err(|e| EngineError::detect(format!("response read failed: {e}")))?
                .to_bytes();

            if !status.is_success() {
                return Err(EngineError::detect(format!(
                    "backend returned {status}: {}",
                    String::from_utf8_lossy(&body)
                )));
            }
            parse_detect_response(&body)
        })
    }
}
