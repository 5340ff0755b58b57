//! Segment Tracker Tests.
//!
//! Verifies per-segment ray counting and that a drained segment yields one completion per
//! contributing bucket, exactly once.

use proptest::prelude::*;
use raystream_core::units::staging::segment::{SegmentState, SegmentTracker};

#[test]
fn counts_rise_then_fall_to_zero() {
    let mut t = SegmentTracker::new();
    t.register_bucket(7, 4);
    assert_eq!(
        t.state(7),
        Some(&SegmentState {
            active_rays: 4,
            active_buckets: 1
        })
    );
    for left in (1..4).rev() {
        assert_eq!(t.retire_ray(7), 0);
        assert_eq!(t.state(7).map(|s| s.active_rays), Some(left));
    }
    assert_eq!(t.retire_ray(7), 1);
    assert_eq!(t.state(7), None);
    assert_eq!(t.completed().collect::<Vec<_>>(), vec![7]);
}

#[test]
fn overlapping_buckets_share_one_lifecycle() {
    let mut t = SegmentTracker::new();
    t.register_bucket(5, 2);
    assert_eq!(t.retire_ray(5), 0);
    t.register_bucket(5, 1);
    assert_eq!(t.state(5).map(|s| s.active_buckets), Some(2));
    assert_eq!(t.retire_ray(5), 0);
    assert_eq!(t.retire_ray(5), 2);
    assert_eq!(t.pop_completed(), Some(5));
    assert_eq!(t.pop_completed(), Some(5));
    assert_eq!(t.pop_completed(), None);
}

#[test]
fn segments_are_independent() {
    let mut t = SegmentTracker::new();
    t.register_bucket(1, 1);
    t.register_bucket(2, 2);
    assert_eq!(t.live_segments(), 2);
    assert_eq!(t.retire_ray(2), 0);
    assert_eq!(t.retire_ray(1), 1);
    assert_eq!(t.live_segments(), 1);
    assert_eq!(t.completed().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn a_new_lifecycle_starts_after_completion() {
    let mut t = SegmentTracker::new();
    t.register_bucket(3, 1);
    assert_eq!(t.retire_ray(3), 1);
    t.register_bucket(3, 1);
    assert_eq!(t.state(3).map(|s| s.active_buckets), Some(1));
    assert_eq!(t.retire_ray(3), 1);
    assert_eq!(t.completed().count(), 2);
}

#[test]
#[should_panic(expected = "no live rays")]
fn retiring_an_unknown_segment_panics() {
    let mut t = SegmentTracker::new();
    let _ = t.retire_ray(4);
}

proptest! {
    /// Registering buckets up front and retiring every ray completes the segment exactly
    /// once, on the last ray, with one completion per bucket.
    #[test]
    fn completions_match_buckets(sizes in prop::collection::vec(1u32..8, 1..6)) {
        let mut t = SegmentTracker::new();
        for &n in &sizes {
            t.register_bucket(9, n);
        }
        let total: u32 = sizes.iter().sum();
        for i in 1..=total {
            let queued = t.retire_ray(9);
            if i < total {
                prop_assert_eq!(queued, 0);
                prop_assert!(!t.has_completed());
            } else {
                prop_assert_eq!(queued as usize, sizes.len());
            }
        }
        prop_assert_eq!(t.completed().count(), sizes.len());
        prop_assert!(t.state(9).is_none());
    }
}
