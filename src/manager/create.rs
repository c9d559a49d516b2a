//! Session creation

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::session::{SessionDescriptor, StreamSettings};

use super::core::SessionManager;

/// Request parameters for creating a new stream session
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Session id; must be unique among live sessions
    pub id: String,
    /// Source stream locator, e.g. an `rtsp://` URL
    pub source_url: String,
    /// Stream geometry
    pub settings: StreamSettings,
}

impl SessionManager {
    /// Create and start a new stream session
    ///
    /// Checks a session out of the pool (or allocates one), assigns it a
    /// freshly generated stream key, registers it, spawns its external
    /// processes, and launches its task tree. Detection starts disabled.
    ///
    /// # Errors
    /// Returns [`EngineError::AlreadyExists`] if the id is registered;
    /// under concurrent creation with one id, exactly one caller succeeds.
    /// Returns [`EngineError::StreamSetup`] if either external process fails
    /// to start; the half-prepared session is reset and discarded, and the
    /// id becomes available again.
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionDescriptor> {
        if request.id.is_empty() {
            return Err(EngineError::invalid_config("session id must not be empty"));
        }
        if self.sessions.read().contains_key(&request.id) {
            return Err(EngineError::AlreadyExists(request.id));
        }

        let session = self.checkout();
        // a stream key is never reused: fresh on every activation
        let stream_key = Uuid::new_v4().to_string();
        session
            .activate(
                &request.id,
                &request.source_url,
                request.settings,
                stream_key.clone(),
                self.cancel.child_token(),
                self.close_tx.clone(),
                self.cfg.sample_queue_capacity,
            )
            .await;

        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(&request.id) {
                drop(sessions);
                session.reset().await;
                self.recycle(session);
                return Err(EngineError::AlreadyExists(request.id));
            }
            sessions.insert(request.id.clone(), Arc::clone(&session));
        }

        let destination = format!("{}{}", self.cfg.push_url_internal_pre, stream_key);
        if let Err(err) = session.prepare(&self.ffmpeg, &destination).await {
            self.sessions.write().remove(&request.id);
            // reset before discard; a failed activation never reaches the pool
            session.reset().await;
            return Err(err);
        }

        log::info!(
            "session started: id={} source={} push={}",
            request.id,
            request.source_url,
            destination
        );
        Arc::clone(&session).spawn_run(Arc::clone(&self.backend), self.run_config());

        Ok(session.descriptor(&self.cfg.push_url_public_pre))
    }
}
