//! Staging buffer harness.
//!
//! The test plays every lane: it writes `LOAD`/`STORE` requests into the staging buffer's
//! lane ports and reads work items back, while `tick` runs one rise/fall cycle against the
//! scheduler double.

use raystream_core::common::addr::Address;
use raystream_core::common::constants::WORK_ITEM_SIZE;
use raystream_core::config::StagingConfig;
use raystream_core::protocol::memory::MemoryRequest;
use raystream_core::protocol::work_item::{BucketRay, RayBucket, WorkItem};
use raystream_core::scheduler::StreamScheduler;
use raystream_core::units::{ClockedUnit, MemoryUnit, UnitRayStagingBuffer};

use super::mocks::FakeScheduler;

pub struct StagingHarness<S: StreamScheduler = FakeScheduler> {
    pub unit: UnitRayStagingBuffer,
    pub scheduler: S,
    pub cycle: u64,
}

impl StagingHarness<FakeScheduler> {
    /// Tile 0 with `lanes` lanes and default staging parameters.
    pub fn new(lanes: usize) -> Self {
        Self::with_scheduler(lanes, FakeScheduler::new())
    }
}

impl<S: StreamScheduler> StagingHarness<S> {
    pub fn with_scheduler(lanes: usize, scheduler: S) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            unit: UnitRayStagingBuffer::new(0, lanes, &StagingConfig::default()),
            scheduler,
            cycle: 0,
        }
    }

    /// One rise phase followed by one fall phase.
    pub fn tick(&mut self) {
        self.unit.clock_rise(&mut self.scheduler);
        self.unit.clock_fall(&mut self.scheduler);
        self.cycle += 1;
    }

    pub fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Ticks until `done` holds, failing the test after `limit` cycles.
    pub fn run_until(&mut self, limit: u64, mut done: impl FnMut(&Self) -> bool) {
        let start = self.cycle;
        while !done(self) {
            assert!(
                self.cycle - start < limit,
                "condition not reached within {limit} cycles"
            );
            self.tick();
        }
    }

    /// Lane `lane` asks for a work item.
    pub fn load(&mut self, lane: usize) {
        assert!(self.unit.request_port_write_valid(lane), "lane {lane} port busy");
        let req = MemoryRequest::load(lane as u16, Address::default(), WORK_ITEM_SIZE as u8);
        self.unit.write_request(req, lane);
    }

    /// Lane `lane` stores a work item.
    pub fn store(&mut self, lane: usize, item: WorkItem) {
        assert!(self.unit.request_port_write_valid(lane), "lane {lane} port busy");
        let req = MemoryRequest::store(lane as u16, Address::default(), &item.to_bytes());
        self.unit.write_request(req, lane);
    }

    /// Lane `lane` sends a `LOAD` and the harness ticks once so it is latched and booked.
    pub fn load_and_tick(&mut self, lane: usize) {
        self.load(lane);
        self.tick();
    }

    /// Returns true if a work item is waiting for `lane`.
    pub fn has_item(&self, lane: usize) -> bool {
        self.unit.return_port_read_valid(lane)
    }

    /// Takes the work item waiting for `lane`.
    pub fn take_item(&mut self, lane: usize) -> WorkItem {
        assert!(self.has_item(lane), "no work item for lane {lane}");
        let ret = self.unit.read_return(lane);
        assert_eq!(ret.port as usize, lane);
        WorkItem::from_bytes(ret.valid_data())
    }
}

/// Bucket for `segment` whose rays are tagged 0, 1, 2, ... in their first byte.
pub fn tagged_bucket(segment: u32, num_rays: u8) -> RayBucket {
    let mut bucket = RayBucket::new(segment);
    for tag in 0..num_rays {
        bucket.push(BucketRay::tagged(tag));
    }
    bucket
}
