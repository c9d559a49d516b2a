//! Descriptor queries, detection toggles, and session removal

use crate::detect::DetectionBox;
use crate::session::SessionDescriptor;

use super::core::SessionManager;

impl SessionManager {
    /// Descriptor of one session, if registered
    #[must_use]
    pub fn get_session_descriptor(&self, id: &str) -> Option<SessionDescriptor> {
        self.sessions
            .read()
            .get(id)
            .map(|s| s.descriptor(&self.cfg.push_url_public_pre))
    }

    /// Descriptors of all running sessions, sorted by id
    #[must_use]
    pub fn list_session_descriptors(&self) -> Vec<SessionDescriptor> {
        let mut list: Vec<SessionDescriptor> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.is_running())
            .map(|s| s.descriptor(&self.cfg.push_url_public_pre))
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Enable detection sampling; no-op if the id is unknown
    pub fn enable_detection(&self, id: &str) {
        if let Some(session) = self.sessions.read().get(id) {
            session.set_detecting(true);
        }
    }

    /// Disable detection sampling; no-op if the id is unknown
    pub fn disable_detection(&self, id: &str) {
        if let Some(session) = self.sessions.read().get(id) {
            session.set_detecting(false);
        }
    }

    /// Snapshot of a session's latest completed detection batch
    #[must_use]
    pub fn latest_detections(&self, id: &str) -> Option<Vec<DetectionBox>> {
        self.sessions
            .read()
            .get(id)
            .map(|s| s.latest_detections())
    }

    /// Stop a session, deregister it, and return it to the pool
    ///
    /// No-op if the id is unknown. If another reclamation path has already
    /// claimed the session's close guard, this only fires its cancellation
    /// signal and lets that path finish the job.
    pub async fn remove_session(&self, id: &str) {
        let Some(session) = self.sessions.read().get(id).cloned() else {
            return;
        };
        if !session.mark_close_handled() {
            session.cancel_now();
            return;
        }

        self.sessions.write().remove(id);
        session.finish(session.current_epoch()).await;
        session.reset().await;
        self.recycle(session);
        log::info!("session removed: id={id}");
    }
}
