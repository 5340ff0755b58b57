//! Bucket Scheduler Tests.
//!
//! A staging buffer wired to a real `BucketScheduler` over the fixed-latency DRAM model.
//! The test still plays the lanes; both units are clocked with all rises before all falls.

use pretty_assertions::assert_eq;
use raystream_core::common::constants::{INVALID_SEGMENT, RAY_GENERATION_SEGMENT};
use raystream_core::config::SchedulerConfig;
use raystream_core::dram::{DramBackend, FixedLatencyBackend};
use raystream_core::protocol::work_item::{BucketRay, WorkItem};
use raystream_core::scheduler::BucketScheduler;
use raystream_core::units::{ClockedUnit, MemoryUnit};

use crate::common::harness::{StagingHarness, tagged_bucket};

type Scheduler = BucketScheduler<FixedLatencyBackend>;

const DRAM_LATENCY: u64 = 4;
const LIMIT: u64 = 2_000;

fn system(lanes: usize) -> StagingHarness<Scheduler> {
    let scheduler = BucketScheduler::new(
        1,
        &SchedulerConfig::default(),
        FixedLatencyBackend::new(DRAM_LATENCY),
    );
    StagingHarness::with_scheduler(lanes, scheduler)
}

fn step(h: &mut StagingHarness<Scheduler>) {
    h.unit.clock_rise(&mut h.scheduler);
    h.scheduler.clock_rise(&mut ());
    h.unit.clock_fall(&mut h.scheduler);
    h.scheduler.clock_fall(&mut ());
    h.cycle += 1;
}

fn step_until(
    h: &mut StagingHarness<Scheduler>,
    mut done: impl FnMut(&StagingHarness<Scheduler>) -> bool,
) {
    let start = h.cycle;
    while !done(h) {
        assert!(h.cycle - start < LIMIT, "condition not reached within {LIMIT} cycles");
        step(h);
    }
}

fn wait_for_port(h: &mut StagingHarness<Scheduler>, lane: usize) {
    step_until(h, |h| h.unit.request_port_write_valid(lane));
}

// ══════════════════════════════════════════════════════════
// 1. Full bucket round trips
// ══════════════════════════════════════════════════════════

#[test]
fn preloaded_bucket_is_served_then_terminated() {
    let mut h = system(2);
    h.scheduler.push_bucket(tagged_bucket(4, 2));
    h.load(0);
    h.load(1);

    step_until(&mut h, |h| h.has_item(0) && h.has_item(1));
    let mut tags = vec![h.take_item(0), h.take_item(1)]
        .into_iter()
        .map(|item| {
            assert_eq!(item.segment, 4);
            item.bray.0[0]
        })
        .collect::<Vec<_>>();
    tags.sort_unstable();
    assert_eq!(tags, vec![0, 1]);
    assert_eq!(h.scheduler.outstanding_buckets(), 1);

    h.load(0);
    h.load(1);
    step_until(&mut h, |h| h.has_item(0) && h.has_item(1));
    assert_eq!(h.take_item(0).segment, INVALID_SEGMENT);
    assert_eq!(h.take_item(1).segment, INVALID_SEGMENT);

    let stats = *h.scheduler.stats();
    assert_eq!(stats.buckets_served, 1);
    assert_eq!(stats.buckets_completed, 1);
    assert_eq!(stats.terminations_sent, 1);
    assert_eq!(stats.buckets_sealed, 0);
    assert!(h.scheduler.is_drained());
    assert_eq!(h.scheduler.dram().stats().reads, 128);
}

#[test]
fn stored_rays_come_back_after_generation_ends() {
    let mut h = system(1);
    for tag in 0..3 {
        wait_for_port(&mut h, 0);
        h.store(0, WorkItem::new(BucketRay::tagged(tag), 2));
    }
    wait_for_port(&mut h, 0);
    h.load(0);

    for tag in 0..3 {
        step_until(&mut h, |h| h.has_item(0));
        let item = h.take_item(0);
        assert_eq!((item.bray.0[0], item.segment), (tag, 2));
        assert!(h.scheduler.generation_finished());
        h.load(0);
    }
    step_until(&mut h, |h| h.has_item(0));
    assert_eq!(h.take_item(0).segment, INVALID_SEGMENT);

    let stats = *h.scheduler.stats();
    assert_eq!(stats.work_items_stored, 3);
    assert_eq!(stats.buckets_sealed, 1);
    assert_eq!(stats.buckets_completed, 1);
    assert_eq!(h.scheduler.open_rays(2), 0);
    assert_eq!(h.scheduler.dram().stats().writes, 128);
    assert!(!h.scheduler.dram().is_busy());
}

#[test]
fn consecutive_buckets_of_one_segment_complete_separately() {
    let mut h = system(1);
    h.scheduler.push_bucket(tagged_bucket(9, 1));
    h.scheduler.push_bucket(tagged_bucket(9, 1));
    assert_eq!(h.scheduler.ready_buckets(), 2);

    h.load(0);
    step_until(&mut h, |h| h.has_item(0));
    assert_eq!(h.take_item(0).segment, 9);
    assert!(h.scheduler.generation_finished());
    assert_eq!(h.unit.lanes_done_generating(), None);

    h.load(0);
    step_until(&mut h, |h| h.has_item(0));
    assert_eq!(h.take_item(0).segment, 9);
    h.load(0);
    step_until(&mut h, |h| h.has_item(0));
    assert_eq!(h.take_item(0).segment, INVALID_SEGMENT);
    assert_eq!(h.scheduler.stats().buckets_completed, 2);
}

// ══════════════════════════════════════════════════════════
// 2. Construction and preload checks
// ══════════════════════════════════════════════════════════

#[test]
#[should_panic(expected = "is reserved")]
fn preloading_a_reserved_segment_panics() {
    let mut h = system(1);
    h.scheduler.push_bucket(tagged_bucket(RAY_GENERATION_SEGMENT, 1));
}

#[test]
#[should_panic(expected = "no rays")]
fn preloading_an_empty_bucket_panics() {
    let mut h = system(1);
    h.scheduler.push_bucket(tagged_bucket(3, 0));
}

#[test]
#[should_panic(expected = "not bucket aligned")]
fn misaligned_heap_base_panics() {
    let config = SchedulerConfig {
        bucket_base: 0x1000_0040,
        ..SchedulerConfig::default()
    };
    let _ = Scheduler::new(1, &config, FixedLatencyBackend::new(1));
}
