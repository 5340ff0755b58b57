//! Synthetic compute lane.
//!
//! Stands in for a ray tracing core. A lane only exercises the staging buffer's lane ports:
//! 1. **Generation:** Stores its primary rays, spreading them over the scene segments.
//! 2. **Tracing:** Holds each received work item for a fixed number of cycles.
//! 3. **Bounces:** Stores a continuation ray into the next segment while the item's bounce
//!    count is below the limit.
//! 4. **Termination:** Stops on a work item of the invalid segment.
//!
//! Ray payload layout: byte 0 is the bounce count, bytes 1..5 the lane id and bytes 5..9 the
//! primary ray index, both little endian. The rest is zero.

use tracing::trace;

use crate::common::addr::{Address, VirtAddr};
use crate::common::constants::{INVALID_SEGMENT, WORK_ITEM_SIZE};
use crate::config::WorkloadConfig;
use crate::protocol::memory::MemoryRequest;
use crate::protocol::work_item::{BucketRay, WorkItem};
use crate::units::unit::{ClockedUnit, MemoryUnit};

/// Virtual address lanes issue work item traffic to.
const WORK_ITEM_ADDR: u64 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
enum LaneState {
    /// Storing primary rays; holds how many went out.
    Generating(u32),
    /// Waiting for port space to send a `LOAD`.
    Loading,
    /// `LOAD` sent; waiting for a work item.
    Waiting,
    /// Tracing `item` for `remaining` more cycles.
    Tracing { item: WorkItem, remaining: u64 },
    /// Waiting for port space to store a continuation.
    Storing(WorkItem),
    Finished,
}

/// One synthetic lane attached to a staging buffer port.
#[derive(Debug)]
pub struct SyntheticLane {
    port: usize,
    id: u32,
    rays_per_lane: u32,
    segments: u32,
    max_bounces: u8,
    trace_latency: u64,
    state: LaneState,
    rays_traced: u64,
}

impl SyntheticLane {
    /// Creates a lane on staging port `port`.
    ///
    /// # Arguments
    ///
    /// * `port` - Lane index within its tile.
    /// * `id` - Lane index across the whole system; picks the first segment.
    /// * `workload` - Rays, segments, bounces and trace latency.
    ///
    /// # Panics
    ///
    /// Panics if `workload.segments` is zero.
    pub fn new(port: usize, id: u32, workload: &WorkloadConfig) -> Self {
        assert!(workload.segments > 0, "workload has no segments");
        Self {
            port,
            id,
            rays_per_lane: workload.rays_per_lane,
            segments: workload.segments,
            max_bounces: workload.max_bounces,
            trace_latency: workload.trace_latency,
            state: LaneState::Generating(0),
            rays_traced: 0,
        }
    }

    /// Staging port of this lane.
    #[inline]
    pub const fn port(&self) -> usize {
        self.port
    }

    /// Returns true once the lane has received its terminal ray.
    pub fn is_finished(&self) -> bool {
        self.state == LaneState::Finished
    }

    /// Returns true while the lane is waiting on a `LOAD`.
    pub fn is_waiting(&self) -> bool {
        self.state == LaneState::Waiting
    }

    /// Work items traced so far.
    #[inline]
    pub const fn rays_traced(&self) -> u64 {
        self.rays_traced
    }

    /// Segment following `segment`, wrapping back to 1.
    const fn next_segment(&self, segment: u32) -> u32 {
        segment % self.segments + 1
    }

    fn primary_ray(&self, index: u32) -> WorkItem {
        let mut bray = BucketRay::default();
        bray.0[1..5].copy_from_slice(&self.id.to_le_bytes());
        bray.0[5..9].copy_from_slice(&index.to_le_bytes());
        let segment = (self.id.wrapping_add(index)) % self.segments + 1;
        WorkItem::new(bray, segment)
    }

    fn store<M: MemoryUnit + ?Sized>(&self, mem: &mut M, item: &WorkItem) -> bool {
        if !mem.request_port_write_valid(self.port) {
            return false;
        }
        let req = MemoryRequest::store(
            self.port as u16,
            Address::Virt(VirtAddr::new(WORK_ITEM_ADDR)),
            &item.to_bytes(),
        );
        mem.write_request(req, self.port);
        true
    }

    fn load<M: MemoryUnit + ?Sized>(&self, mem: &mut M) -> bool {
        if !mem.request_port_write_valid(self.port) {
            return false;
        }
        let req = MemoryRequest::load(
            self.port as u16,
            Address::Virt(VirtAddr::new(WORK_ITEM_ADDR)),
            WORK_ITEM_SIZE as u8,
        );
        mem.write_request(req, self.port);
        true
    }
}

impl<M: MemoryUnit + ?Sized> ClockedUnit<M> for SyntheticLane {
    fn clock_rise(&mut self, mem: &mut M) {
        if self.state != LaneState::Waiting || !mem.return_port_read_valid(self.port) {
            return;
        }
        let ret = mem.read_return(self.port);
        let item = WorkItem::from_bytes(ret.valid_data());
        if item.segment == INVALID_SEGMENT {
            trace!(lane = self.id, "lane finished");
            self.state = LaneState::Finished;
        } else {
            self.rays_traced += 1;
            self.state = LaneState::Tracing {
                item,
                remaining: self.trace_latency,
            };
        }
    }

    fn clock_fall(&mut self, mem: &mut M) {
        self.state = match std::mem::replace(&mut self.state, LaneState::Finished) {
            LaneState::Generating(issued) if issued < self.rays_per_lane => {
                let item = self.primary_ray(issued);
                if self.store(mem, &item) {
                    LaneState::Generating(issued + 1)
                } else {
                    LaneState::Generating(issued)
                }
            }
            LaneState::Generating(_) | LaneState::Loading => {
                if self.load(mem) {
                    LaneState::Waiting
                } else {
                    LaneState::Loading
                }
            }
            LaneState::Tracing { item, remaining } if remaining > 1 => LaneState::Tracing {
                item,
                remaining: remaining - 1,
            },
            LaneState::Tracing { item, .. } => {
                let bounce = item.bray.0[0];
                if bounce < self.max_bounces {
                    let mut bray = item.bray;
                    bray.0[0] = bounce + 1;
                    LaneState::Storing(WorkItem::new(bray, self.next_segment(item.segment)))
                } else if self.load(mem) {
                    LaneState::Waiting
                } else {
                    LaneState::Loading
                }
            }
            LaneState::Storing(item) => {
                if self.store(mem, &item) {
                    LaneState::Loading
                } else {
                    LaneState::Storing(item)
                }
            }
            state @ (LaneState::Waiting | LaneState::Finished) => state,
        };
    }
}
