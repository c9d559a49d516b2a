//! Background reclamation loops
//!
//! The close-drain loop is the primary reclamation path: sessions report
//! their own id on termination and are deregistered, reset, and pooled
//! here. The health sweep is the self-healing backstop: it reclaims any
//! registered session whose loops exited without a successful close report.
//! Both paths, and explicit removal, are mutually exclusive per id through
//! the session's single-shot close guard.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::Session;

use super::core::{Pool, Registry};

/// Consume close notifications until cancelled
pub(super) async fn close_drain(
    cancel: CancellationToken,
    sessions: Registry,
    pool: Pool,
    mut close_rx: mpsc::Receiver<String>,
) {
    log::info!("session manager close-drain running...");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("session manager close-drain stopped");
                break;
            }
            id = close_rx.recv() => {
                let Some(id) = id else { break };
                let Some(session) = sessions.write().remove(&id) else {
                    continue;
                };
                log::info!("stream session \"{id}\" closed, reclaiming");
                session.reset().await;
                pool.lock().push(session);
            }
        }
    }
}

/// Periodically reclaim sessions whose close report was lost
pub(super) async fn health_sweep(
    cancel: CancellationToken,
    sessions: Registry,
    pool: Pool,
    interval: Duration,
) {
    log::info!("session manager health sweep running...");
    let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("session manager health sweep stopped");
                break;
            }
            _ = tick.tick() => reclaim_stalled(&sessions, &pool).await,
        }
    }
}

/// One sweep pass over the registry
pub(super) async fn reclaim_stalled(sessions: &Registry, pool: &Pool) {
    let stale: Vec<(String, Arc<Session>)> = sessions
        .read()
        .iter()
        .filter(|(_, s)| !s.is_running())
        .map(|(id, s)| (id.clone(), Arc::clone(s)))
        .collect();

    for (id, session) in stale {
        // the guard keeps this from racing the close-drain and removal paths
        if !session.mark_close_handled() {
            continue;
        }
        sessions.write().remove(&id);
        session.cancel_now();
        session.reset().await;
        pool.lock().push(session);
        log::info!("reclaimed non-running session: id={id}");
    }
}
