//! Scheduler doubles.
//!
//! `FakeScheduler` accepts everything and replays queued returns; `MockScheduler` is a
//! `mockall` mock for tests that need exact call expectations.

use std::collections::VecDeque;

use mockall::mock;
use raystream_core::common::addr::{Address, PhysAddr};
use raystream_core::common::constants::CACHE_BLOCK_SIZE;
use raystream_core::protocol::memory::MemoryReturn;
use raystream_core::protocol::scheduler::{SchedulerRequestType, StreamSchedulerRequest};
use raystream_core::protocol::work_item::RayBucket;
use raystream_core::scheduler::StreamScheduler;

mock! {
    pub Scheduler {}
    impl StreamScheduler for Scheduler {
        fn request_port_write_valid(&self, tile: usize) -> bool;
        fn write_request(&mut self, request: StreamSchedulerRequest, tile: usize);
        fn return_port_read_valid(&self, tile: usize) -> bool;
        fn read_return(&mut self, tile: usize) -> MemoryReturn;
    }
}

/// Scheduler that records requests and hands out scripted returns, one per read.
#[derive(Debug)]
pub struct FakeScheduler {
    /// Whether the request port accepts writes.
    pub accept: bool,
    /// Every request written, in order.
    pub requests: Vec<StreamSchedulerRequest>,
    /// Returns still to be read.
    pub returns: VecDeque<MemoryReturn>,
}

impl Default for FakeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self {
            accept: true,
            requests: Vec::new(),
            returns: VecDeque::new(),
        }
    }

    /// Queues `bucket` as 64-byte returns for `tile`, addressed from `base`.
    pub fn queue_bucket(&mut self, tile: u16, bucket: &RayBucket, base: u64) {
        let image = bucket.encode();
        for (i, chunk) in image.chunks(CACHE_BLOCK_SIZE).enumerate() {
            let addr = Address::Phys(PhysAddr::new(base + (i * CACHE_BLOCK_SIZE) as u64));
            self.returns.push_back(MemoryReturn::new(tile, 0, addr, chunk));
        }
    }

    /// Queues the zero-size termination sentinel.
    pub fn queue_termination(&mut self, tile: u16) {
        self.returns.push_back(MemoryReturn::termination(tile));
    }

    /// Requests of `kind` seen so far.
    pub fn count(&self, kind: SchedulerRequestType) -> usize {
        self.requests.iter().filter(|r| r.kind == kind).count()
    }

    /// `BUCKET_COMPLETE` requests for `segment` seen so far.
    pub fn completions(&self, segment: u32) -> usize {
        self.requests
            .iter()
            .filter(|r| r.kind == SchedulerRequestType::BucketComplete && r.segment == segment)
            .count()
    }
}

impl StreamScheduler for FakeScheduler {
    fn request_port_write_valid(&self, _tile: usize) -> bool {
        self.accept
    }

    fn write_request(&mut self, request: StreamSchedulerRequest, _tile: usize) {
        assert!(self.accept, "request written to a full port");
        self.requests.push(request);
    }

    fn return_port_read_valid(&self, _tile: usize) -> bool {
        !self.returns.is_empty()
    }

    fn read_return(&mut self, _tile: usize) -> MemoryReturn {
        self.returns.pop_front().expect("read from an empty return port")
    }
}
