//! Ray staging buffer.
//!
//! One staging buffer sits in front of every tile and mediates between the tile's lanes
//! and the stream scheduler. It performs the following:
//! 1. **Latching:** Accepts one lane request at a time from the request cascade.
//! 2. **Double Buffering:** Streams the next bucket into the back slot while lanes drain
//!    the front slot (see [`bucket`]).
//! 3. **Drain:** Hands one work item per `LOAD`, oldest requesting lane first.
//! 4. **Lifecycle:** Counts in-flight rays per segment and announces finished buckets
//!    (see [`segment`]).
//! 5. **Upstream Arbitration:** Sends at most one scheduler request per cycle, by strict
//!    priority (see [`arbiter`]).
//!
//! A lane's `LOAD` means "give me a ray; the last one you gave me is done". The first `LOAD`
//! from a lane instead means it has finished generating primary rays.

/// Upstream request priority.
pub mod arbiter;

/// Front/back bucket slots.
pub mod bucket;

/// Per-segment in-flight ray counting.
pub mod segment;

use std::collections::VecDeque;

use tracing::{debug, trace};

use self::arbiter::{Candidates, Grant, arbitrate};
use self::bucket::{BucketDoubleBuffer, Fold};
use self::segment::SegmentTracker;
use crate::common::addr::Address;
use crate::common::constants::{MAX_RAYS_PER_BUCKET, RAY_GENERATION_SEGMENT};
use crate::config::StagingConfig;
use crate::network::{Cascade, FifoArray};
use crate::protocol::memory::{MemoryRequest, MemoryRequestType, MemoryReturn};
use crate::protocol::scheduler::StreamSchedulerRequest;
use crate::protocol::work_item::WorkItem;
use crate::scheduler::StreamScheduler;
use crate::stats::StagingStats;
use crate::units::unit::{ClockedUnit, MemoryUnit};

/// Destination register encoding stamped on dispatched work items.
const WORK_ITEM_DST: u16 = 0;

/// Progress of the tile's ray generation phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RayGeneration {
    /// This many lanes have finished generating.
    Running(usize),
    /// Completion has been announced upstream.
    Reported,
}

/// Per-tile ray staging buffer.
#[derive(Debug)]
pub struct UnitRayStagingBuffer {
    tile: usize,
    num_lanes: usize,
    dispatch_width: usize,

    request_network: Cascade<MemoryRequest>,
    return_network: FifoArray<MemoryReturn>,

    /// The single latched lane request.
    request: Option<MemoryRequest>,

    buffers: BucketDoubleBuffer,
    segments: SegmentTracker,
    /// Segment of each lane's most recent ray; `None` until its first ray.
    lane_segment: Vec<Option<u32>>,
    /// Lanes waiting for a ray, oldest first.
    workitem_queue: VecDeque<usize>,
    generation: RayGeneration,

    stats: StagingStats,
}

impl UnitRayStagingBuffer {
    /// Creates the staging buffer of `tile`, serving `num_lanes` lanes.
    ///
    /// # Arguments
    ///
    /// * `tile` - Index of this tile on the scheduler's ports.
    /// * `num_lanes` - Lanes attached to the tile.
    /// * `config` - Return queue depth and dispatch width.
    ///
    /// # Panics
    ///
    /// Panics if there are no lanes, more lanes than a bucket holds rays, or a zero
    /// dispatch width.
    pub fn new(tile: usize, num_lanes: usize, config: &StagingConfig) -> Self {
        assert!(num_lanes > 0, "tile {tile} has no lanes");
        assert!(
            num_lanes <= MAX_RAYS_PER_BUCKET,
            "{num_lanes} lanes can't each get a terminal ray from one bucket"
        );
        assert!(config.dispatch_width > 0, "dispatch width must be nonzero");
        Self {
            tile,
            num_lanes,
            dispatch_width: config.dispatch_width,
            request_network: Cascade::new(num_lanes, 1),
            return_network: FifoArray::new(num_lanes, config.return_queue_depth),
            request: None,
            buffers: BucketDoubleBuffer::new(),
            segments: SegmentTracker::new(),
            lane_segment: vec![None; num_lanes],
            workitem_queue: VecDeque::with_capacity(num_lanes),
            generation: RayGeneration::Running(0),
            stats: StagingStats::default(),
        }
    }

    /// Tile index.
    #[inline]
    pub const fn tile(&self) -> usize {
        self.tile
    }

    /// Number of lanes served.
    #[inline]
    pub const fn num_lanes(&self) -> usize {
        self.num_lanes
    }

    /// The bucket slots.
    #[inline]
    pub const fn buffers(&self) -> &BucketDoubleBuffer {
        &self.buffers
    }

    /// The segment lifecycle tracker.
    #[inline]
    pub const fn segments(&self) -> &SegmentTracker {
        &self.segments
    }

    /// Segment of the last ray dispatched to `lane`, or `None` before its first ray.
    pub fn lane_segment(&self, lane: usize) -> Option<u32> {
        self.lane_segment[lane]
    }

    /// Lanes waiting for a ray, oldest first.
    pub fn waiting_lanes(&self) -> impl Iterator<Item = usize> + '_ {
        self.workitem_queue.iter().copied()
    }

    /// Lanes that have finished ray generation, or `None` once that was announced.
    pub const fn lanes_done_generating(&self) -> Option<usize> {
        match self.generation {
            RayGeneration::Running(n) => Some(n),
            RayGeneration::Reported => None,
        }
    }

    /// The latched lane request, if any.
    pub const fn latched_request(&self) -> Option<&MemoryRequest> {
        self.request.as_ref()
    }

    /// Counters.
    #[inline]
    pub const fn stats(&self) -> &StagingStats {
        &self.stats
    }

    /// Returns true if no lane traffic is buffered anywhere in the unit.
    pub fn is_idle(&self) -> bool {
        self.request.is_none()
            && self.workitem_queue.is_empty()
            && self.request_network.is_idle()
            && self.return_network.is_idle()
    }

    /// Swaps buffers if possible, then sends at most one request upstream.
    fn issue_requests<S: StreamScheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if self.buffers.try_swap() {
            self.stats.buckets_swapped_in += 1;
            debug!(
                tile = self.tile,
                segment = self.buffers.front().segment(),
                num_rays = self.buffers.front().num_rays(),
                "bucket swapped to front"
            );
        }

        let candidates = Candidates {
            fill: self.buffers.needs_fill(),
            store: self
                .request
                .as_ref()
                .is_some_and(|r| r.kind == MemoryRequestType::Store),
            generation_complete: self.generation == RayGeneration::Running(self.num_lanes),
            bucket_complete: self.segments.has_completed(),
        };
        let port_ready = scheduler.request_port_write_valid(self.tile);
        let Some(grant) = arbitrate(candidates, port_ready) else {
            if !candidates.is_empty() {
                self.stats.upstream_stalls += 1;
            }
            return;
        };

        let port = self.tile as u16;
        let req = match grant {
            Grant::Fill => {
                self.buffers.mark_requested();
                self.stats.fill_requests += 1;
                trace!(tile = self.tile, "requesting bucket fill");
                StreamSchedulerRequest::load_bucket(port)
            }
            Grant::Store => {
                let Some(store) = self.request.take() else {
                    unreachable!("store granted with no latched request");
                };
                let item = WorkItem::from_bytes(store.valid_data());
                self.stats.stores_forwarded += 1;
                trace!(
                    tile = self.tile,
                    lane = store.port,
                    segment = item.segment,
                    "forwarding work item"
                );
                StreamSchedulerRequest::store_work_item(port, item)
            }
            Grant::GenerationComplete => {
                self.generation = RayGeneration::Reported;
                self.stats.generation_completes += 1;
                debug!(tile = self.tile, "ray generation complete");
                StreamSchedulerRequest::bucket_complete(port, RAY_GENERATION_SEGMENT)
            }
            Grant::BucketComplete => {
                let Some(segment) = self.segments.pop_completed() else {
                    unreachable!("bucket completion granted with none queued");
                };
                self.stats.bucket_completes += 1;
                trace!(tile = self.tile, segment, "announcing bucket completion");
                StreamSchedulerRequest::bucket_complete(port, segment)
            }
        };
        scheduler.write_request(req, self.tile);
    }

    /// Books a latched `LOAD` and hands out rays to waiting lanes.
    fn issue_returns(&mut self) {
        if let Some(load) = self.request.take_if(|r| r.kind == MemoryRequestType::Load) {
            let lane = load.port as usize;
            assert!(
                !self.workitem_queue.contains(&lane),
                "lane {lane} issued a LOAD while already waiting"
            );
            self.workitem_queue.push_back(lane);
            match self.lane_segment[lane] {
                Some(segment) => {
                    let completions = self.segments.retire_ray(segment);
                    if completions > 0 {
                        debug!(tile = self.tile, segment, completions, "segment drained");
                    }
                }
                None => self.lane_done_generating(lane),
            }
        }

        let mut dispatched = 0;
        while dispatched < self.dispatch_width && !self.buffers.front().is_drained() {
            let Some(&head) = self.workitem_queue.front() else {
                break;
            };
            if !self.return_network.is_write_valid(head) {
                self.stats.return_stalls += 1;
                break;
            }
            let Some(lane) = self.workitem_queue.pop_front() else {
                break;
            };
            let num_rays = self.buffers.front().num_rays() as u32;
            let Some((bray, segment, first)) = self.buffers.take_ray() else {
                unreachable!("front bucket drained during dispatch");
            };
            if first {
                self.segments.register_bucket(segment, num_rays);
            }

            let item = WorkItem::new(bray, segment);
            let ret = MemoryReturn::new(
                lane as u16,
                WORK_ITEM_DST,
                Address::default(),
                &item.to_bytes(),
            );
            self.return_network.write(ret, lane);
            self.lane_segment[lane] = Some(segment);
            self.stats.rays_dispatched += 1;
            dispatched += 1;
        }
    }

    fn lane_done_generating(&mut self, lane: usize) {
        match self.generation {
            RayGeneration::Running(n) => {
                assert!(n < self.num_lanes, "more lanes finished generating than exist");
                self.generation = RayGeneration::Running(n + 1);
                trace!(tile = self.tile, lane, done = n + 1, "lane finished ray generation");
            }
            RayGeneration::Reported => {
                panic!("lane {lane} finished ray generation after tile {} reported", self.tile)
            }
        }
    }
}

impl<S: StreamScheduler + ?Sized> ClockedUnit<S> for UnitRayStagingBuffer {
    fn clock_rise(&mut self, scheduler: &mut S) {
        self.request_network.clock();
        if self.request.is_none() && self.request_network.is_read_valid(0) {
            self.request = Some(self.request_network.read(0));
        }

        if scheduler.return_port_read_valid(self.tile) {
            let ret = scheduler.read_return(self.tile);
            match self.buffers.fold_return(&ret, self.num_lanes) {
                Fold::Terminal => {
                    self.stats.termination_buckets += 1;
                    debug!(tile = self.tile, "termination bucket received");
                }
                Fold::Complete => {
                    trace!(
                        tile = self.tile,
                        segment = self.buffers.back().segment(),
                        "bucket received"
                    );
                }
                Fold::Partial => {}
            }
        }
    }

    fn clock_fall(&mut self, scheduler: &mut S) {
        self.issue_requests(scheduler);
        self.issue_returns();
        self.return_network.clock();
    }
}

impl MemoryUnit for UnitRayStagingBuffer {
    fn request_port_write_valid(&self, port: usize) -> bool {
        self.request_network.is_write_valid(port)
    }

    fn write_request(&mut self, request: MemoryRequest, port: usize) {
        assert!(
            matches!(request.kind, MemoryRequestType::Load | MemoryRequestType::Store),
            "staging buffer can't service {:?}",
            request.kind
        );
        assert_eq!(
            request.port as usize, port,
            "request tagged for lane {} arrived on port {port}",
            request.port
        );
        self.request_network.write(request, port);
    }

    fn return_port_read_valid(&self, port: usize) -> bool {
        self.return_network.is_read_valid(port)
    }

    fn peek_return(&self, port: usize) -> &MemoryReturn {
        self.return_network.peek(port)
    }

    fn read_return(&mut self, port: usize) -> MemoryReturn {
        self.return_network.read(port)
    }
}
