//! Shared detection result cache

use parking_lot::RwLock;

use crate::detect::DetectionBox;

/// Latest completed batch of detection boxes for one session
///
/// Written wholesale by the detection loop, snapshot-copied by the frame
/// loop. A batch is atomic: readers see either the complete prior batch or
/// the complete new one, never a mix. Critical sections are copy-only; no
/// I/O or encoding ever happens under the lock.
#[derive(Debug, Default)]
pub struct ResultCache {
    boxes: RwLock<Vec<DetectionBox>>,
}

impl ResultCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current batch out under the read lock
    #[must_use]
    pub fn snapshot(&self) -> Vec<DetectionBox> {
        self.boxes.read().clone()
    }

    /// Replace the batch wholesale
    pub fn replace(&self, batch: Vec<DetectionBox>) {
        *self.boxes.write() = batch;
    }

    /// Drop the current batch
    pub fn clear(&self) {
        self.boxes.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn batch(label: &str, n: usize) -> Vec<DetectionBox> {
        (0..n)
            .map(|i| DetectionBox {
                x1: i as i32,
                y1: i as i32,
                x2: i as i32 + 10,
                y2: i as i32 + 10,
                label: label.to_string(),
                conf: 0.5,
            })
            .collect()
    }

    #[test]
    fn replace_and_snapshot() {
        let cache = ResultCache::new();
        assert!(cache.snapshot().is_empty());

        cache.replace(batch("person", 3));
        assert_eq!(cache.snapshot().len(), 3);

        cache.clear();
        assert!(cache.snapshot().is_empty());
    }

    #[test]
    fn snapshots_are_never_torn() {
        let cache = Arc::new(ResultCache::new());
        let writers: Vec<_> = ["person", "car"]
            .into_iter()
            .map(|label| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        cache.replace(batch(label, 4));
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = cache.snapshot();
                        if let Some(first) = snap.first() {
                            // a batch carries exactly one writer's label
                            assert!(snap.iter().all(|b| b.label == first.label));
                            assert_eq!(snap.len(), 4);
                        }
                    }
                })
            })
            .collect();

        for t in writers.into_iter().chain(readers) {
            t.join().unwrap();
        }
    }
}
