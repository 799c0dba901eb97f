//! LRU (Least Recently Used) replacement policy.

use std::collections::{BTreeMap, HashMap};

use crate::common::FrameId;

/// Least-recently-used eviction order over buffer pool frames.
///
/// Every access stamps the frame with the next value of a logical clock. An
/// ordered index from stamp to frame makes the oldest frame the first entry,
/// so no linked list of frames is needed.
///
/// The replacer only tracks recency. Whether a frame may actually be evicted
/// (pinned by a guard, or holding an exclusively locked page) is decided by
/// the predicate passed to [`victim`](Self::victim).
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Logical clock, bumped on every access.
    clock: u64,

    /// Access stamp → frame, oldest first.
    by_stamp: BTreeMap<u64, FrameId>,

    /// Frame → its latest access stamp.
    stamps: HashMap<FrameId, u64>,
}

impl LruReplacer {
    /// Create an empty replacer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `frame_id` as the most recently used frame.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.clock += 1;
        if let Some(old) = self.stamps.insert(frame_id, self.clock) {
            self.by_stamp.remove(&old);
        }
        self.by_stamp.insert(self.clock, frame_id);
    }

    /// The least recently used frame for which `can_evict` holds.
    ///
    /// The frame stays tracked; call [`remove`](Self::remove) once it has
    /// actually been evicted.
    pub fn victim(&self, mut can_evict: impl FnMut(FrameId) -> bool) -> Option<FrameId> {
        self.by_stamp
            .values()
            .copied()
            .find(|&frame_id| can_evict(frame_id))
    }

    /// Stop tracking `frame_id`.
    pub fn remove(&mut self, frame_id: FrameId) {
        if let Some(stamp) = self.stamps.remove(&frame_id) {
            self.by_stamp.remove(&stamp);
        }
    }

    /// Number of tracked frames.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_order() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));

        assert_eq!(replacer.len(), 3);
        assert_eq!(replacer.victim(|_| true), Some(FrameId::new(0)));
    }

    #[test]
    fn test_reaccess_moves_to_back() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.victim(|_| true), Some(FrameId::new(1)));
        assert_eq!(replacer.len(), 2);
    }

    #[test]
    fn test_victim_skips_filtered_frames() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));

        // Frame 0 is pinned
        assert_eq!(
            replacer.victim(|f| f != FrameId::new(0)),
            Some(FrameId::new(1))
        );
        assert_eq!(replacer.victim(|_| false), None);
    }

    #[test]
    fn test_remove() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.remove(FrameId::new(0));
        replacer.remove(FrameId::new(7));

        assert_eq!(replacer.victim(|_| true), Some(FrameId::new(1)));
        replacer.remove(FrameId::new(1));
        assert!(replacer.is_empty());
        assert_eq!(replacer.victim(|_| true), None);
    }
}
