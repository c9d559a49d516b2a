//! Core session manager structure and lifecycle management

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::detect::{DetectBackend, backend_from_config};
use crate::error::Result;
use crate::media;
use crate::session::{RunConfig, Session};

use super::background;

/// Registry of live sessions, shared with the background loops
pub(super) type Registry = Arc<RwLock<HashMap<String, Arc<Session>>>>;

/// Pool of retired sessions awaiting reuse
pub(super) type Pool = Arc<Mutex<Vec<Arc<Session>>>>;

/// Manager for multiple concurrent stream sessions
///
/// Owns the registry of live sessions, a pool of retired session objects,
/// the bounded close-notification queue, and two background loops: the
/// close-drain (primary reclamation path) and the health sweep (self-healing
/// backstop for lost close notifications). Every session's cancellation
/// token is a child of the manager's root token, so cancelling the manager
/// cascades to every session.
pub struct SessionManager {
    pub(super) cfg: EngineConfig,
    pub(super) backend: Arc<dyn DetectBackend>,
    pub(super) ffmpeg: PathBuf,
    pub(super) cancel: CancellationToken,
    pub(super) sessions: Registry,
    pub(super) pool: Pool,
    pub(super) close_tx: mpsc::Sender<String>,
    sweep_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager with an explicit detection backend
    ///
    /// Spawns the close-drain and health-sweep loops immediately; must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the ffmpeg binary cannot be located
    pub fn new(cfg: EngineConfig, backend: Arc<dyn DetectBackend>) -> Result<Self> {
        let ffmpeg = match &cfg.ffmpeg_path {
            Some(path) => path.clone(),
            None => media::find_ffmpeg()?,
        };

        let cancel = CancellationToken::new();
        let sessions: Registry = Arc::new(RwLock::new(HashMap::new()));
        let pool: Pool = Arc::new(Mutex::new(Vec::new()));
        let (close_tx, close_rx) = mpsc::channel(cfg.close_queue_capacity.max(1));

        let drain = tokio::spawn(background::close_drain(
            cancel.clone(),
            Arc::clone(&sessions),
            Arc::clone(&pool),
            close_rx,
        ));
        let sweep = tokio::spawn(background::health_sweep(
            cancel.clone(),
            Arc::clone(&sessions),
            Arc::clone(&pool),
            Duration::from_secs(cfg.health_interval_secs.max(1)),
        ));

        Ok(Self {
            cfg,
            backend,
            ffmpeg,
            cancel,
            sessions,
            pool,
            close_tx,
            sweep_handles: Mutex::new(vec![drain, sweep]),
        })
    }

    /// Create a manager with the detection backend selected by configuration
    ///
    /// # Errors
    /// Returns error if the backend cannot be built or ffmpeg is missing
    pub fn from_config(cfg: EngineConfig) -> Result<Self> {
        let backend = backend_from_config(&cfg)?;
        Self::new(cfg, backend)
    }

    /// Gracefully shut the manager down
    ///
    /// Cancels the root token (which cascades to every session's derived
    /// token), then synchronously deregisters, resets, and pools every
    /// remaining session before returning.
    pub async fn shutdown(&self) {
        log::info!("session manager shutting down...");
        self.cancel.cancel();

        let drained: Vec<Arc<Session>> =
            { self.sessions.write().drain().map(|(_, s)| s).collect() };
        let reclaimed = futures::future::join_all(drained.into_iter().map(|session| async move {
            session.force_close_handled();
            session.finish(session.current_epoch()).await;
            session.reset().await;
            session
        }))
        .await;
        self.pool.lock().extend(reclaimed);

        log::info!("session manager shutdown complete");
    }

    /// Check a session out of the pool, or allocate a fresh one
    pub(super) fn checkout(&self) -> Arc<Session> {
        self.pool
            .lock()
            .pop()
            .unwrap_or_else(|| Arc::new(Session::new()))
    }

    /// Return a reset session to the pool
    pub(super) fn recycle(&self, session: Arc<Session>) {
        self.pool.lock().push(session);
    }

    /// Frame-loop parameters derived from the configuration
    pub(super) fn run_config(&self) -> RunConfig {
        RunConfig {
            sample_interval: self.cfg.sample_interval(),
            jpeg_quality: self.cfg.jpeg_quality,
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        for handle in self.sweep_handles.lock().drain(..) {
            handle.abort();
        }
    }
}
