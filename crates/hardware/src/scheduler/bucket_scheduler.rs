//! Bucketing stream scheduler.
//!
//! Gathers stored work items into per-segment ray buckets and streams whole buckets to tiles
//! that ask for work. The model is built from:
//! 1. **Ports:** One request and one return `FifoArray` entry per tile.
//! 2. **Binning:** One open bucket per segment; a full bucket is sealed, given a DRAM address
//!    and written back.
//! 3. **Streaming:** A pending `LOAD_BUCKET` is served with the oldest sealed bucket, read
//!    out of DRAM one cache block at a time. Once ray generation is over everywhere, the
//!    fullest open bucket is sealed early rather than leaving a tile idle.
//! 4. **Termination:** Once every tile has finished ray generation and no ray is left
//!    anywhere, pending loads are answered with the zero-size sentinel.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, trace};

use super::StreamScheduler;
use crate::common::addr::{Address, PhysAddr};
use crate::common::constants::{
    BLOCKS_PER_BUCKET, CACHE_BLOCK_SIZE, INVALID_SEGMENT, RAY_BUCKET_SIZE, RAY_GENERATION_SEGMENT,
};
use crate::config::SchedulerConfig;
use crate::dram::DramBackend;
use crate::network::FifoArray;
use crate::protocol::memory::MemoryReturn;
use crate::protocol::scheduler::{SchedulerRequestType, StreamSchedulerRequest};
use crate::protocol::work_item::RayBucket;
use crate::stats::SchedulerStats;
use crate::units::unit::ClockedUnit;

/// Destination encoding stamped on bucket data returns.
const BUCKET_DST: u16 = 0;

/// Bits of a DRAM tag holding the block index.
const TAG_BLOCK_BITS: u32 = 16;

/// A sealed bucket with its place in memory.
#[derive(Debug)]
struct SealedBucket {
    addr: u64,
    bucket: RayBucket,
}

/// A bucket being read out of DRAM for one tile.
#[derive(Debug)]
struct Transfer {
    addr: u64,
    image: Vec<u8>,
    issued: usize,
    returned: usize,
}

impl Transfer {
    fn block(&self, index: usize) -> &[u8] {
        let off = index * CACHE_BLOCK_SIZE;
        &self.image[off..off + CACHE_BLOCK_SIZE]
    }
}

/// Stream scheduler that bins rays by segment and serves whole buckets.
#[derive(Debug)]
pub struct BucketScheduler<D: DramBackend> {
    num_tiles: usize,
    bucket_base: u64,
    dram_issue_width: usize,

    request_ports: FifoArray<StreamSchedulerRequest>,
    return_ports: FifoArray<MemoryReturn>,
    /// Returns produced but not yet accepted by a full return port.
    outbox: Vec<VecDeque<MemoryReturn>>,

    dram: D,
    next_slot: u64,
    /// Block addresses of sealed buckets still to be written.
    write_backlog: VecDeque<u64>,

    open: BTreeMap<u32, RayBucket>,
    ready: VecDeque<SealedBucket>,
    transfers: Vec<Option<Transfer>>,
    pending_load: Vec<bool>,
    generation_done: Vec<bool>,
    /// Buckets served and not yet completed, by tile and segment.
    outstanding: BTreeMap<(usize, u32), usize>,
    next_tile: usize,

    stats: SchedulerStats,
}

impl<D: DramBackend> BucketScheduler<D> {
    /// Creates a scheduler serving `num_tiles` tiles through `dram`.
    ///
    /// # Panics
    ///
    /// Panics if there are no tiles, a queue depth is zero, or the bucket heap isn't aligned
    /// to the bucket size.
    pub fn new(num_tiles: usize, config: &SchedulerConfig, dram: D) -> Self {
        assert!(num_tiles > 0, "scheduler needs at least one tile");
        assert!(config.dram_issue_width > 0, "DRAM issue width must be nonzero");
        assert_eq!(
            config.bucket_base % RAY_BUCKET_SIZE as u64,
            0,
            "bucket heap base {:#x} is not bucket aligned",
            config.bucket_base
        );
        Self {
            num_tiles,
            bucket_base: config.bucket_base,
            dram_issue_width: config.dram_issue_width,
            request_ports: FifoArray::new(num_tiles, config.request_queue_depth),
            return_ports: FifoArray::new(num_tiles, config.return_queue_depth),
            outbox: (0..num_tiles).map(|_| VecDeque::new()).collect(),
            dram,
            next_slot: 0,
            write_backlog: VecDeque::new(),
            open: BTreeMap::new(),
            ready: VecDeque::new(),
            transfers: (0..num_tiles).map(|_| None).collect(),
            pending_load: vec![false; num_tiles],
            generation_done: vec![false; num_tiles],
            outstanding: BTreeMap::new(),
            next_tile: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Number of tiles served.
    #[inline]
    pub const fn num_tiles(&self) -> usize {
        self.num_tiles
    }

    /// The DRAM backend.
    #[inline]
    pub const fn dram(&self) -> &D {
        &self.dram
    }

    /// Counters.
    #[inline]
    pub const fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Sealed buckets waiting for a tile.
    pub fn ready_buckets(&self) -> usize {
        self.ready.len()
    }

    /// Rays held in open buckets of `segment`.
    pub fn open_rays(&self, segment: u32) -> usize {
        self.open.get(&segment).map_or(0, RayBucket::len)
    }

    /// Buckets served to tiles whose completion hasn't arrived yet.
    pub fn outstanding_buckets(&self) -> usize {
        self.outstanding.values().sum()
    }

    /// Returns true if `tile` has asked for a bucket that hasn't been answered.
    pub fn has_pending_load(&self, tile: usize) -> bool {
        self.pending_load[tile]
    }

    /// Adds an already written bucket to the ready queue.
    ///
    /// # Panics
    ///
    /// Panics if the bucket is empty or belongs to a reserved segment.
    pub fn push_bucket(&mut self, bucket: RayBucket) {
        assert!(!bucket.is_empty(), "preloaded bucket has no rays");
        assert!(
            bucket.segment != INVALID_SEGMENT && bucket.segment != RAY_GENERATION_SEGMENT,
            "segment {} is reserved",
            bucket.segment
        );
        let addr = self.allocate();
        self.ready.push_back(SealedBucket { addr, bucket });
    }

    /// Returns true once no ray remains anywhere and every tile is done generating.
    pub fn is_drained(&self) -> bool {
        self.generation_finished()
            && self.open.is_empty()
            && self.ready.is_empty()
            && self.outstanding.is_empty()
            && self.transfers.iter().all(Option::is_none)
            && self.outbox.iter().all(VecDeque::is_empty)
            && self.write_backlog.is_empty()
            && !self.dram.is_busy()
    }

    /// Returns true once every tile has announced the end of ray generation.
    pub fn generation_finished(&self) -> bool {
        self.generation_done.iter().all(|&done| done)
    }

    fn allocate(&mut self) -> u64 {
        let addr = self.bucket_base + self.next_slot * RAY_BUCKET_SIZE as u64;
        self.next_slot += 1;
        addr
    }

    fn seal(&mut self, bucket: RayBucket) {
        let addr = self.allocate();
        self.write_backlog
            .extend((0..BLOCKS_PER_BUCKET).map(|i| addr + (i * CACHE_BLOCK_SIZE) as u64));
        self.stats.buckets_sealed += 1;
        trace!(segment = bucket.segment, num_rays = bucket.len(), addr, "bucket sealed");
        self.ready.push_back(SealedBucket { addr, bucket });
    }

    /// Seals the open bucket holding the most rays, lowest segment first on ties.
    fn seal_fullest(&mut self) -> bool {
        let fullest = self
            .open
            .iter()
            .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))
            .map(|(&segment, _)| segment);
        let Some(bucket) = fullest.and_then(|segment| self.open.remove(&segment)) else {
            return false;
        };
        self.seal(bucket);
        true
    }

    fn handle_request(&mut self, req: StreamSchedulerRequest, tile: usize) {
        match req.kind {
            SchedulerRequestType::StoreWorkItem => {
                assert!(
                    req.segment != INVALID_SEGMENT && req.segment != RAY_GENERATION_SEGMENT,
                    "tile {tile} stored a ray into reserved segment {}",
                    req.segment
                );
                let bucket = self
                    .open
                    .entry(req.segment)
                    .or_insert_with(|| RayBucket::new(req.segment));
                bucket.push(req.bray);
                self.stats.work_items_stored += 1;
                if bucket.is_full() {
                    if let Some(full) = self.open.remove(&req.segment) {
                        self.seal(full);
                    }
                }
            }
            SchedulerRequestType::LoadBucket => {
                assert!(!self.pending_load[tile], "tile {tile} already has a load pending");
                self.pending_load[tile] = true;
            }
            SchedulerRequestType::BucketComplete if req.segment == RAY_GENERATION_SEGMENT => {
                assert!(
                    !self.generation_done[tile],
                    "tile {tile} finished ray generation twice"
                );
                self.generation_done[tile] = true;
                debug!(tile, "tile finished ray generation");
            }
            SchedulerRequestType::BucketComplete => {
                let key = (tile, req.segment);
                let Some(count) = self.outstanding.get_mut(&key) else {
                    panic!(
                        "tile {tile} completed a bucket of segment {} it was never sent",
                        req.segment
                    );
                };
                *count -= 1;
                if *count == 0 {
                    let _ = self.outstanding.remove(&key);
                }
                self.stats.buckets_completed += 1;
                trace!(tile, segment = req.segment, "bucket completed");
            }
            SchedulerRequestType::Na => panic!("tile {tile} sent an empty scheduler request"),
        }
    }

    /// Starts a transfer for every idle tile with a pending load, rotating the start tile.
    fn serve_loads(&mut self) {
        for i in 0..self.num_tiles {
            let tile = (self.next_tile + i) % self.num_tiles;
            if !self.pending_load[tile] || self.transfers[tile].is_some() {
                continue;
            }
            if self.ready.is_empty() && !(self.generation_finished() && self.seal_fullest()) {
                continue;
            }
            let Some(SealedBucket { addr, bucket }) = self.ready.pop_front() else {
                continue;
            };
            debug!(
                tile,
                segment = bucket.segment,
                num_rays = bucket.len(),
                addr,
                "serving bucket"
            );
            *self.outstanding.entry((tile, bucket.segment)).or_insert(0) += 1;
            self.transfers[tile] = Some(Transfer {
                addr,
                image: bucket.encode(),
                issued: 0,
                returned: 0,
            });
            self.pending_load[tile] = false;
            self.stats.buckets_served += 1;
        }
        self.next_tile = (self.next_tile + 1) % self.num_tiles;
    }

    /// Queues bucket reads, then backlog writes, within the per-cycle issue width.
    fn issue_dram(&mut self) {
        let mut budget = self.dram_issue_width;
        'tiles: for tile in 0..self.num_tiles {
            let Some(transfer) = self.transfers[tile].as_mut() else {
                continue;
            };
            while budget > 0 && transfer.issued < BLOCKS_PER_BUCKET {
                let addr = transfer.addr + (transfer.issued * CACHE_BLOCK_SIZE) as u64;
                let tag = ((tile as u64) << TAG_BLOCK_BITS) | transfer.issued as u64;
                if !self.dram.insert_read(addr, tag) {
                    self.stats.dram_stalls += 1;
                    break 'tiles;
                }
                transfer.issued += 1;
                budget -= 1;
            }
        }
        while budget > 0 {
            let Some(&addr) = self.write_backlog.front() else {
                break;
            };
            if !self.dram.insert_write(addr) {
                self.stats.dram_stalls += 1;
                break;
            }
            let _ = self.write_backlog.pop_front();
            budget -= 1;
        }
    }

    /// Turns finished DRAM reads into bucket data returns.
    fn collect_reads(&mut self) {
        while let Some(done) = self.dram.pop_completed() {
            let tile = (done.tag >> TAG_BLOCK_BITS) as usize;
            let block = (done.tag & ((1 << TAG_BLOCK_BITS) - 1)) as usize;
            let Some(transfer) = self.transfers[tile].as_mut() else {
                panic!("DRAM returned block {block} for tile {tile} with no transfer");
            };
            let ret = MemoryReturn::new(
                tile as u16,
                BUCKET_DST,
                Address::Phys(PhysAddr::new(done.addr)),
                transfer.block(block),
            );
            self.outbox[tile].push_back(ret);
            transfer.returned += 1;
            if transfer.returned == BLOCKS_PER_BUCKET {
                self.transfers[tile] = None;
            }
        }
    }

    /// Answers every pending load with the sentinel once nothing is left to schedule.
    fn terminate_if_drained(&mut self) {
        if !self.pending_load.iter().any(|&p| p) || !self.is_drained() {
            return;
        }
        for tile in 0..self.num_tiles {
            if std::mem::take(&mut self.pending_load[tile]) {
                self.outbox[tile].push_back(MemoryReturn::termination(tile as u16));
                self.stats.terminations_sent += 1;
                debug!(tile, "sending termination sentinel");
            }
        }
    }

    fn flush_outbox(&mut self) {
        for tile in 0..self.num_tiles {
            if self.return_ports.is_write_valid(tile) {
                if let Some(ret) = self.outbox[tile].pop_front() {
                    self.return_ports.write(ret, tile);
                }
            }
        }
    }
}

impl<D: DramBackend> ClockedUnit<()> for BucketScheduler<D> {
    fn clock_rise(&mut self, _ctx: &mut ()) {
        for tile in 0..self.num_tiles {
            if self.request_ports.is_read_valid(tile) {
                let req = self.request_ports.read(tile);
                self.handle_request(req, tile);
            }
        }
    }

    fn clock_fall(&mut self, _ctx: &mut ()) {
        self.serve_loads();
        self.issue_dram();
        self.dram.clock();
        self.collect_reads();
        self.terminate_if_drained();
        self.flush_outbox();
        self.request_ports.clock();
        self.return_ports.clock();
    }
}

impl<D: DramBackend> StreamScheduler for BucketScheduler<D> {
    fn request_port_write_valid(&self, tile: usize) -> bool {
        self.request_ports.is_write_valid(tile)
    }

    fn write_request(&mut self, request: StreamSchedulerRequest, tile: usize) {
        assert_eq!(
            request.port as usize, tile,
            "request tagged for tile {} arrived on port {tile}",
            request.port
        );
        self.request_ports.write(request, tile);
    }

    fn return_port_read_valid(&self, tile: usize) -> bool {
        self.return_ports.is_read_valid(tile)
    }

    fn read_return(&mut self, tile: usize) -> MemoryReturn {
        self.return_ports.read(tile)
    }
}
