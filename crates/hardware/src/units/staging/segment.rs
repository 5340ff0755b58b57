//! Segment lifecycle tracking.
//!
//! A segment stays live while any ray dispatched from one of its buckets is still being
//! traced. The tracker reference-counts those rays and, when the count reaches zero,
//! queues one completion per bucket that contributed to the segment.

use std::collections::{BTreeMap, VecDeque};

/// Lifecycle record of one live segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegmentState {
    /// Rays handed to lanes and not yet reported finished.
    pub active_rays: u32,
    /// Buckets that contributed rays to this lifecycle.
    pub active_buckets: u32,
}

/// Per-segment reference counts plus the queue of completions awaiting announcement.
///
/// A segment has a record exactly while its `active_rays` is nonzero.
#[derive(Debug, Default)]
pub struct SegmentTracker {
    segments: BTreeMap<u32, SegmentState>,
    completed: VecDeque<u32>,
}

impl SegmentTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly fronted bucket of `num_rays` rays for `segment`.
    ///
    /// # Panics
    ///
    /// Panics if `num_rays` is zero.
    pub fn register_bucket(&mut self, segment: u32, num_rays: u32) {
        assert!(num_rays > 0, "empty bucket registered for segment {segment}");
        let state = self.segments.entry(segment).or_default();
        state.active_buckets += 1;
        state.active_rays += num_rays;
    }

    /// Retires one ray of `segment`.
    ///
    /// When the last ray retires the record is removed and one completion per contributing
    /// bucket is queued. Returns the number of completions queued (zero while rays remain).
    ///
    /// # Panics
    ///
    /// Panics if `segment` has no live record.
    pub fn retire_ray(&mut self, segment: u32) -> u32 {
        let Some(state) = self.segments.get_mut(&segment) else {
            panic!("ray retired for segment {segment} with no live rays");
        };
        state.active_rays -= 1;
        if state.active_rays > 0 {
            return 0;
        }
        let buckets = state.active_buckets;
        let _ = self.segments.remove(&segment);
        self.completed.extend(std::iter::repeat_n(segment, buckets as usize));
        buckets
    }

    /// Lifecycle record of `segment`, if live.
    pub fn state(&self, segment: u32) -> Option<&SegmentState> {
        self.segments.get(&segment)
    }

    /// Number of live segments.
    pub fn live_segments(&self) -> usize {
        self.segments.len()
    }

    /// Returns true if a completion is waiting to be announced.
    #[inline]
    pub fn has_completed(&self) -> bool {
        !self.completed.is_empty()
    }

    /// Completions waiting to be announced, oldest first.
    pub fn completed(&self) -> impl Iterator<Item = u32> + '_ {
        self.completed.iter().copied()
    }

    /// Takes the oldest waiting completion.
    pub fn pop_completed(&mut self) -> Option<u32> {
        self.completed.pop_front()
    }
}
