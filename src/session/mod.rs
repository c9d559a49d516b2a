//! Stream session: the unit of concurrency and resource ownership
//!
//! A `Session` owns one stream's ingest and egress processes, its frame
//! loop, its detection loop, and its lifecycle flags. Sessions are created
//! and reclaimed by the [`SessionManager`](crate::manager::SessionManager)
//! and recycled through its pool; after a reset, a checked-out session is
//! indistinguishable from a freshly allocated one.
//!
//! # Module Structure
//!
//! - `state` - explicit lifecycle state machine
//! - `cache` - shared detection result cache
//! - `queue` - bounded detection sample queue
//! - `pipeline` - frame loop, detection loop, and the close path

mod cache;
mod pipeline;
mod queue;
mod state;

pub use cache::ResultCache;
pub use state::SessionState;

pub(crate) use pipeline::RunConfig;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::detect::DetectionBox;
use crate::error::{EngineError, Result};
use crate::media::{EgressProcess, IngestProcess};

use queue::{SampleReceiver, SampleSender};

/// Externally visible description of a session
///
/// The only shape that crosses the manager boundary; process handles,
/// pipes, and cache never do.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// Session id
    pub id: String,
    /// Opaque token the publish URL is derived from
    pub stream_key: String,
    /// Publicly reachable playback URL
    pub push_url_public: String,
    /// Whether detection sampling is currently enabled
    pub detect_enabled: bool,
}

/// Stream geometry for one activation
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub framerate: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            framerate: 25,
        }
    }
}

impl StreamSettings {
    /// Replace zero fields with the defaults
    #[must_use]
    pub fn normalized(self) -> Self {
        let d = Self::default();
        Self {
            width: if self.width == 0 { d.width } else { self.width },
            height: if self.height == 0 { d.height } else { self.height },
            framerate: if self.framerate == 0 {
                d.framerate
            } else {
                self.framerate
            },
        }
    }
}

/// Per-activation identity and stream parameters
#[derive(Debug, Clone, Default)]
struct Identity {
    id: String,
    stream_key: String,
    source_url: String,
    width: u32,
    height: u32,
    framerate: u32,
}

/// One active or pooled stream-processing unit
///
/// Interior-mutable so the manager, the frame loop, the detection loop, and
/// the background sweeps can all hold `Arc<Session>` handles. Short
/// `parking_lot` locks guard identity and flags; process handles live under
/// async mutexes because terminating a child awaits its exit.
pub struct Session {
    ident: Mutex<Identity>,
    state: Mutex<SessionState>,
    detecting: AtomicBool,
    close_handled: AtomicBool,
    /// Activation counter; a stale supervisor task from a previous
    /// activation must never touch a recycled object
    epoch: AtomicU64,
    cancel: Mutex<Option<CancellationToken>>,
    close_tx: Mutex<Option<mpsc::Sender<String>>>,
    cache: Mutex<Arc<ResultCache>>,
    sample_tx: Mutex<Option<SampleSender>>,
    sample_rx: AsyncMutex<Option<SampleReceiver>>,
    ingest: AsyncMutex<Option<IngestProcess>>,
    egress: AsyncMutex<Option<EgressProcess>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an idle session, equivalent to one that has been fully reset
    #[must_use]
    pub fn new() -> Self {
        Self {
            ident: Mutex::new(Identity::default()),
            state: Mutex::new(SessionState::Reset),
            detecting: AtomicBool::new(false),
            close_handled: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            cancel: Mutex::new(None),
            close_tx: Mutex::new(None),
            cache: Mutex::new(Arc::new(ResultCache::new())),
            sample_tx: Mutex::new(None),
            sample_rx: AsyncMutex::new(None),
            ingest: AsyncMutex::new(None),
            egress: AsyncMutex::new(None),
        }
    }

    /// Configure a checked-out session for a new activation
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn activate(
        &self,
        id: &str,
        source_url: &str,
        settings: StreamSettings,
        stream_key: String,
        cancel: CancellationToken,
        close_tx: mpsc::Sender<String>,
        sample_capacity: usize,
    ) {
        let settings = settings.normalized();
        *self.ident.lock() = Identity {
            id: id.to_string(),
            stream_key,
            source_url: source_url.to_string(),
            width: settings.width,
            height: settings.height,
            framerate: settings.framerate,
        };
        self.detecting.store(false, Ordering::SeqCst);
        self.close_handled.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.cancel.lock() = Some(cancel);
        *self.close_tx.lock() = Some(close_tx);
        *self.cache.lock() = Arc::new(ResultCache::new());
        let (tx, rx) = queue::sample_queue(sample_capacity);
        *self.sample_tx.lock() = Some(tx);
        *self.sample_rx.lock().await = Some(rx);
        *self.state.lock() = SessionState::Created;
    }

    /// Spawn the ingest and egress processes and wire their pipes
    ///
    /// Detection stays disabled until explicitly enabled. On failure any
    /// partially started process is torn down before the error returns.
    ///
    /// # Errors
    /// Returns [`EngineError::StreamSetup`] if either process fails to start
    pub(crate) async fn prepare(&self, program: &Path, destination: &str) -> Result<()> {
        {
            let state = self.state.lock();
            if *state != SessionState::Created {
                return Err(EngineError::stream_setup(format!(
                    "cannot prepare from state {:?}",
                    *state
                )));
            }
        }
        let ident = self.ident.lock().clone();
        log::info!(
            "session starting: id={} source={} res={}x{} fps={}",
            ident.id,
            ident.source_url,
            ident.width,
            ident.height,
            ident.framerate
        );

        let mut ingest = IngestProcess::spawn(
            program,
            &ident.source_url,
            ident.width,
            ident.height,
            ident.framerate,
        )?;
        let egress = match EgressProcess::spawn(
            program,
            destination,
            ident.width,
            ident.height,
            ident.framerate,
        ) {
            Ok(p) => p,
            Err(err) => {
                ingest.terminate().await;
                return Err(err);
            }
        };

        *self.ingest.lock().await = Some(ingest);
        *self.egress.lock().await = Some(egress);
        self.detecting.store(false, Ordering::SeqCst);
        *self.state.lock() = SessionState::Prepared;
        log::info!("[{}] ingest and egress processes ready", ident.id);
        Ok(())
    }

    /// Return the session to reusable state
    ///
    /// Cancels any lingering task tree, force-terminates both processes,
    /// clears identity and per-activation state, and installs a fresh
    /// result cache. The injected close-notification sender is kept: it is
    /// a structural dependency re-supplied on every checkout.
    pub(crate) async fn reset(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        if let Some(mut p) = self.ingest.lock().await.take() {
            p.terminate().await;
        }
        if let Some(mut p) = self.egress.lock().await.take() {
            p.terminate().await;
        }
        *self.ident.lock() = Identity::default();
        self.detecting.store(false, Ordering::SeqCst);
        self.close_handled.store(false, Ordering::SeqCst);
        *self.cache.lock() = Arc::new(ResultCache::new());
        *self.sample_tx.lock() = None;
        *self.sample_rx.lock().await = None;
        *self.state.lock() = SessionState::Reset;
    }

    /// Build the outward descriptor
    #[must_use]
    pub fn descriptor(&self, push_url_public_pre: &str) -> SessionDescriptor {
        let ident = self.ident.lock();
        SessionDescriptor {
            id: ident.id.clone(),
            stream_key: ident.stream_key.clone(),
            push_url_public: format!("{}{}", push_url_public_pre, ident.stream_key),
            detect_enabled: self.detecting.load(Ordering::SeqCst),
        }
    }

    /// Current session id (empty when idle)
    #[must_use]
    pub fn id(&self) -> String {
        self.ident.lock().id.clone()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether this session counts as a live activation
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Toggle detection sampling; independent of the lifecycle state
    pub fn set_detecting(&self, enabled: bool) {
        self.detecting.store(enabled, Ordering::SeqCst);
    }

    /// Whether detection sampling is enabled
    #[must_use]
    pub fn detecting(&self) -> bool {
        self.detecting.load(Ordering::SeqCst)
    }

    /// Snapshot of the latest completed detection batch
    #[must_use]
    pub fn latest_detections(&self) -> Vec<DetectionBox> {
        let cache = Arc::clone(&self.cache.lock());
        cache.snapshot()
    }

    /// Claim the single-shot close guard; true when this caller won
    pub(crate) fn mark_close_handled(&self) -> bool {
        self.close_handled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Claim the close guard unconditionally (manager shutdown path)
    pub(crate) fn force_close_handled(&self) {
        self.close_handled.store(true, Ordering::SeqCst);
    }

    /// Fire the session's cancellation signal if one is installed
    pub(crate) fn cancel_now(&self) {
        if let Some(cancel) = self.cancel.lock().clone() {
            cancel.cancel();
        }
    }

    /// Current activation number
    pub(crate) fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectBackend;

    struct OneBoxBackend;

    impl DetectBackend for OneBoxBackend {
        fn detect<'a>(
            &'a self,
            _payload: &'a [u8],
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = crate::error::Result<Vec<DetectionBox>>> + Send + 'a>,
        > {
            Box::pin(async {
                Ok(vec![DetectionBox {
                    x1: 10,
                    y1: 10,
                    x2: 50,
                    y2: 50,
                    label: "person".to_string(),
                    conf: 0.9,
                }])
            })
        }
    }

    async fn activated_session(close_capacity: usize) -> (Arc<Session>, mpsc::Receiver<String>) {
        let session = Arc::new(Session::new());
        let (tx, rx) = mpsc::channel(close_capacity);
        session
            .activate(
                "cam1",
                "rtsp://127.0.0.1/cam1",
                StreamSettings::default(),
                "key-1".to_string(),
                CancellationToken::new(),
                tx,
                8,
            )
            .await;
        (session, rx)
    }

    #[tokio::test]
    async fn reset_leaves_no_residual_state() {
        let (session, _rx) = activated_session(4).await;
        session.set_detecting(true);
        session.cache.lock().replace(vec![DetectionBox {
            x1: 1,
            y1: 1,
            x2: 2,
            y2: 2,
            label: "car".to_string(),
            conf: 0.7,
        }]);

        session.reset().await;

        assert_eq!(session.state(), SessionState::Reset);
        assert_eq!(session.id(), "");
        assert!(!session.detecting());
        assert!(session.latest_detections().is_empty());
        let ident = session.ident.lock().clone();
        assert!(ident.stream_key.is_empty());
        assert!(ident.source_url.is_empty());
        assert_eq!(ident.width, 0);
        assert!(session.sample_tx.lock().is_none());
        assert!(session.sample_rx.lock().await.is_none());
        assert!(session.ingest.lock().await.is_none());
        assert!(session.egress.lock().await.is_none());
        // guard rearmed for the next activation
        assert!(session.mark_close_handled());
    }

    #[tokio::test]
    async fn close_report_fires_exactly_once() {
        let (session, mut rx) = activated_session(4).await;
        let epoch = session.current_epoch();

        session.report_close(epoch, "cam1").await;
        session.report_close(epoch, "cam1").await;

        assert_eq!(rx.recv().await.as_deref(), Some("cam1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_epoch_report_is_ignored() {
        let (session, mut rx) = activated_session(4).await;
        let stale = session.current_epoch();

        session.reset().await;
        let (tx, _rx2) = mpsc::channel(4);
        session
            .activate(
                "cam2",
                "rtsp://127.0.0.1/cam2",
                StreamSettings::default(),
                "key-2".to_string(),
                CancellationToken::new(),
                tx,
                8,
            )
            .await;

        session.report_close(stale, "cam1").await;
        assert!(rx.try_recv().is_err());
        // and the new activation's guard is untouched
        assert!(!session.close_handled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn run_refuses_before_prepare_and_reports_closure() {
        let (session, mut rx) = activated_session(4).await;
        assert_eq!(session.state(), SessionState::Created);

        Arc::clone(&session).spawn_run(
            Arc::new(OneBoxBackend),
            RunConfig {
                sample_interval: std::time::Duration::from_millis(10),
                jpeg_quality: 85,
            },
        );

        // the supervisor still walks the cleanup path and reports closure
        let reported = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("close report");
        assert_eq!(reported.as_deref(), Some("cam1"));
        assert_eq!(session.state(), SessionState::Stopping);
    }

    #[test]
    fn settings_normalize_zero_fields() {
        let s = StreamSettings {
            width: 0,
            height: 720,
            framerate: 0,
        }
        .normalized();
        assert_eq!(s.width, 640);
        assert_eq!(s.height, 720);
        assert_eq!(s.framerate, 25);
    }
}
