//! Frame loop, detection loop, and the close path
//!
//! Per session, exactly two long-lived tasks: the frame loop moves frames
//! from ingest to egress continuously and enriches them with the latest
//! detection snapshot; the detection loop drains the sample queue and calls
//! the backend. Detection latency never stalls frame cadence: sampling is a
//! non-blocking enqueue and overlays are stale-tolerant by design.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::detect::DetectBackend;
use crate::media::{EgressProcess, IngestProcess};

use super::queue::SampleReceiver;
use super::{ResultCache, Session, SessionState};

/// Per-activation parameters of the frame loop
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunConfig {
    /// Minimum interval between two detection samples
    pub sample_interval: Duration,
    /// JPEG quality for detection payloads
    pub jpeg_quality: u8,
}

impl Session {
    /// Launch the session's task tree
    ///
    /// The frame loop runs in its own task whose join handle is awaited by a
    /// supervisor, so an unexpected fault in the loop body unwinds into the
    /// normal cleanup-and-report path instead of crashing the process. The
    /// id and epoch are captured here: a supervisor outliving its activation
    /// must never touch a recycled session.
    pub(crate) fn spawn_run(self: Arc<Self>, backend: Arc<dyn DetectBackend>, cfg: RunConfig) {
        let id = self.id();
        let epoch = self.current_epoch();
        tokio::spawn(async move {
            let worker = tokio::spawn(Arc::clone(&self).frame_loop(backend, cfg));
            if let Err(err) = worker.await {
                log::error!("[{id}] frame loop fault: {err}");
            }
            self.finish(epoch).await;
            self.report_close(epoch, &id).await;
            log::info!("[{id}] stream session stopped");
        });
    }

    /// The main loop: read, annotate, sample, emit
    async fn frame_loop(self: Arc<Self>, backend: Arc<dyn DetectBackend>, cfg: RunConfig) {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Prepared {
                log::error!("refusing to run session from state {:?}", *state);
                return;
            }
            *state = SessionState::Running;
        }

        let Some(cancel) = self.cancel.lock().clone() else {
            log::error!("session has no cancellation token");
            return;
        };
        let ident = self.ident.lock().clone();
        let cache = Arc::clone(&*self.cache.lock());
        let sample_tx = self.sample_tx.lock().clone();

        let Some(mut reader) = self
            .ingest
            .lock()
            .await
            .as_mut()
            .and_then(IngestProcess::take_stdout)
        else {
            log::error!("[{}] ingest pipe missing", ident.id);
            return;
        };
        let Some(mut writer) = self
            .egress
            .lock()
            .await
            .as_mut()
            .and_then(EgressProcess::take_stdin)
        else {
            log::error!("[{}] egress pipe missing", ident.id);
            return;
        };

        let detect_task = self.sample_rx.lock().await.take().map(|rx| {
            tokio::spawn(Self::detection_loop(
                cancel.clone(),
                rx,
                backend,
                Arc::clone(&cache),
                ident.id.clone(),
            ))
        });

        let frame_len = ident.width as usize * ident.height as usize * 3;
        let mut raw = vec![0u8; frame_len];
        // first sample is allowed immediately
        let mut last_sample = Instant::now()
            .checked_sub(cfg.sample_interval)
            .unwrap_or_else(Instant::now);

        loop {
            if cancel.is_cancelled() {
                log::info!("[{}] cancellation observed", ident.id);
                break;
            }

            // a stalled ingest process cannot outlive cancellation: the read
            // races the token
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                res = reader.read_exact(&mut raw) => res,
            };
            match read {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    log::error!("[{}] ingest stream ended, terminating session", ident.id);
                    cancel.cancel();
                    break;
                }
                Err(e) => {
                    log::debug!("[{}] frame read error, skipping frame: {e}", ident.id);
                    continue;
                }
            }

            let Some(mut frame) = codec::decode_rgb_frame(&raw, ident.width, ident.height) else {
                continue;
            };

            // copy the batch out under the read lock; drawing never holds it
            let boxes = cache.snapshot();
            codec::draw_detections(&mut frame, &boxes);

            if self.detecting.load(Ordering::Relaxed)
                && last_sample.elapsed() >= cfg.sample_interval
            {
                last_sample = Instant::now();
                // the next snapshot should see "no data yet" rather than a
                // batch from two cycles ago
                cache.clear();
                match codec::encode_jpeg(&frame, cfg.jpeg_quality) {
                    Ok(payload) => {
                        if let Some(tx) = &sample_tx
                            && !tx.offer(payload)
                        {
                            log::debug!("[{}] detection queue full, dropping sample", ident.id);
                        }
                    }
                    Err(e) => {
                        log::error!("[{}] {e}", ident.id);
                        continue;
                    }
                }
            }

            let write = tokio::select! {
                _ = cancel.cancelled() => break,
                res = writer.write_all(frame.as_raw()) => res,
            };
            if let Err(e) = write {
                log::error!("[{}] egress write failed, terminating session: {e}", ident.id);
                cancel.cancel();
                break;
            }
        }

        // EOF to the egress process
        drop(writer);
        if let Some(task) = detect_task {
            let _ = task.await;
        }
    }

    /// Drain the sample queue and call the detection backend
    ///
    /// Failures leave the cache untouched: stale-but-valid boxes beat an
    /// empty overlay. The backend bounds each request with a timeout, so a
    /// hung service cannot pin this task past cancellation for long.
    async fn detection_loop(
        cancel: CancellationToken,
        mut rx: SampleReceiver,
        backend: Arc<dyn DetectBackend>,
        cache: Arc<ResultCache>,
        session_id: String,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                payload = rx.recv() => {
                    let Some(payload) = payload else { break };
                    match backend.detect(&payload).await {
                        Ok(batch) => cache.replace(batch),
                        Err(e) => log::warn!("[{session_id}] detection failed: {e}"),
                    }
                }
            }
        }
        log::debug!("[{session_id}] detection loop stopped");
    }

    /// Stop the pipeline: mark stopping, cancel, terminate both processes
    ///
    /// Idempotent; a stale epoch makes this a no-op.
    pub(crate) async fn finish(&self, epoch: u64) {
        if self.current_epoch() != epoch {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.is_active() {
                *state = SessionState::Stopping;
            }
        }
        self.cancel_now();
        if let Some(mut p) = self.ingest.lock().await.take() {
            p.terminate().await;
        }
        if let Some(mut p) = self.egress.lock().await.take() {
            p.terminate().await;
        }
    }

    /// Report this activation's closure to the manager, at most once
    pub(crate) async fn report_close(&self, epoch: u64, id: &str) {
        if self.current_epoch() != epoch {
            return;
        }
        if !self.mark_close_handled() {
            return;
        }
        let tx = self.close_tx.lock().clone();
        if let Some(tx) = tx
            && tx.send(id.to_string()).await.is_err()
        {
            log::warn!("[{id}] close notification dropped: manager gone");
        }
    }
}
