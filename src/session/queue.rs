//! Bounded detection sample queue
//!
//! Single producer (frame loop), single consumer (detection loop). Enqueue
//! never blocks: a full queue drops the sample, keeping frame cadence
//! independent of detection latency.

use tokio::sync::mpsc;

/// Create the two ends of a session's sample queue
pub(crate) fn sample_queue(capacity: usize) -> (SampleSender, SampleReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SampleSender { tx }, SampleReceiver { rx })
}

/// Frame-loop end: non-blocking enqueue with drop-on-full semantics
#[derive(Clone)]
pub(crate) struct SampleSender {
    tx: mpsc::Sender<Vec<u8>>,
}

impl SampleSender {
    /// Offer one encoded frame; returns false when the queue is full
    /// or the consumer is gone
    pub fn offer(&self, payload: Vec<u8>) -> bool {
        self.tx.try_send(payload).is_ok()
    }
}

/// Detection-loop end
pub(crate) struct SampleReceiver {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl SampleReceiver {
    /// Await the next sampled frame; `None` when the producer is gone
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}
