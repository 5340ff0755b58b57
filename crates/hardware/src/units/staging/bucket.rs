//! Ray bucket double buffer.
//!
//! Two bucket-sized slots let a tile drain one bucket to its lanes while the next one is
//! streamed in from the scheduler:
//! 1. **Front:** The slot being drained, one ray per dispatch.
//! 2. **Back:** The slot being filled by scheduler returns.
//! 3. **Swap:** Roles exchange by index once back is full and front is drained; the
//!    8 KiB payload is never copied.

use crate::common::constants::{
    BUCKET_RAY_SIZE, INVALID_SEGMENT, MAX_RAYS_PER_BUCKET, RAY_BUCKET_NUM_RAYS_OFFSET,
    RAY_BUCKET_SEGMENT_OFFSET, RAY_BUCKET_SIZE,
};
use crate::protocol::memory::MemoryReturn;
use crate::protocol::work_item::{BucketRay, bucket_ray_offset};

/// One bucket-sized slot plus its fill/drain state.
#[derive(Clone, PartialEq, Eq)]
pub struct RayBucketBuffer {
    data: Box<[u8]>,
    /// A fill has been asked for and has not completed.
    pub requested: bool,
    /// Bytes of the current fill received so far.
    pub bytes_returned: usize,
    /// Drain cursor.
    pub next_ray: usize,
}

impl RayBucketBuffer {
    /// Creates an empty slot: no rays, nothing requested.
    pub fn new() -> Self {
        Self {
            data: vec![0u8; RAY_BUCKET_SIZE].into_boxed_slice(),
            requested: false,
            bytes_returned: 0,
            next_ray: 0,
        }
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let b = &self.data[offset..offset + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn write_u32(&mut self, offset: usize, val: u32) {
        self.data[offset..offset + 4].copy_from_slice(&val.to_le_bytes());
    }

    /// Number of valid rays in the bucket.
    #[inline]
    pub fn num_rays(&self) -> usize {
        self.read_u32(RAY_BUCKET_NUM_RAYS_OFFSET) as usize
    }

    /// Overwrites the ray count.
    pub fn set_num_rays(&mut self, num_rays: usize) {
        assert!(
            num_rays <= MAX_RAYS_PER_BUCKET,
            "{num_rays} rays don't fit in a bucket"
        );
        self.write_u32(RAY_BUCKET_NUM_RAYS_OFFSET, num_rays as u32);
    }

    /// Segment owning the bucket.
    #[inline]
    pub fn segment(&self) -> u32 {
        self.read_u32(RAY_BUCKET_SEGMENT_OFFSET)
    }

    /// Overwrites the owning segment.
    pub fn set_segment(&mut self, segment: u32) {
        self.write_u32(RAY_BUCKET_SEGMENT_OFFSET, segment);
    }

    /// Ray at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` lies past the bucket's ray area.
    pub fn ray(&self, index: usize) -> BucketRay {
        assert!(index < MAX_RAYS_PER_BUCKET, "ray index {index} out of bucket");
        let off = bucket_ray_offset(index);
        BucketRay::from_bytes(&self.data[off..off + BUCKET_RAY_SIZE])
    }

    /// Raw bucket image.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copies a chunk of an incoming bucket to `offset` and counts it as received.
    ///
    /// # Panics
    ///
    /// Panics if the chunk would overrun the slot or the fill would exceed one bucket.
    pub fn fill(&mut self, offset: usize, bytes: &[u8]) {
        assert!(
            offset + bytes.len() <= RAY_BUCKET_SIZE,
            "fill of {} bytes at {offset} overruns the bucket",
            bytes.len()
        );
        assert!(
            self.bytes_returned + bytes.len() <= RAY_BUCKET_SIZE,
            "bucket fill exceeds {RAY_BUCKET_SIZE} bytes"
        );
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.bytes_returned += bytes.len();
    }

    /// Forces the slot into the complete, terminal state: one terminal ray per lane.
    pub fn make_terminal(&mut self, num_lanes: usize) {
        self.bytes_returned = RAY_BUCKET_SIZE;
        self.set_segment(INVALID_SEGMENT);
        self.set_num_rays(num_lanes);
    }

    /// Returns true once a whole bucket has been received.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.bytes_returned == RAY_BUCKET_SIZE
    }

    /// Returns true once every ray has been handed out.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.next_ray >= self.num_rays()
    }

    /// Returns true if this slot holds the termination bucket.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.segment() == INVALID_SEGMENT
    }
}

impl Default for RayBucketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RayBucketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayBucketBuffer")
            .field("segment", &self.segment())
            .field("num_rays", &self.num_rays())
            .field("requested", &self.requested)
            .field("bytes_returned", &self.bytes_returned)
            .field("next_ray", &self.next_ray)
            .finish()
    }
}

/// What a scheduler return did to the back buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fold {
    /// Data was copied; the bucket is still incomplete.
    Partial,
    /// Data was copied and completed the bucket.
    Complete,
    /// A termination sentinel was received.
    Terminal,
}

/// Front/back pair of bucket slots.
#[derive(Debug, Default)]
pub struct BucketDoubleBuffer {
    slots: [RayBucketBuffer; 2],
    front: usize,
}

impl BucketDoubleBuffer {
    /// Creates a pair of empty slots with slot 0 in front.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot being drained.
    #[inline]
    pub fn front(&self) -> &RayBucketBuffer {
        &self.slots[self.front]
    }

    /// Mutable slot being drained.
    #[inline]
    pub fn front_mut(&mut self) -> &mut RayBucketBuffer {
        &mut self.slots[self.front]
    }

    /// Slot being filled.
    #[inline]
    pub fn back(&self) -> &RayBucketBuffer {
        &self.slots[self.front ^ 1]
    }

    /// Mutable slot being filled.
    #[inline]
    pub fn back_mut(&mut self) -> &mut RayBucketBuffer {
        &mut self.slots[self.front ^ 1]
    }

    /// Index of the slot currently in front.
    #[inline]
    pub const fn front_index(&self) -> usize {
        self.front
    }

    /// Folds one scheduler return into the back buffer.
    ///
    /// A zero-size return is the termination sentinel and completes the back buffer with
    /// `num_lanes` terminal rays. Anything else is copied at its offset within the bucket.
    pub fn fold_return(&mut self, ret: &MemoryReturn, num_lanes: usize) -> Fold {
        let back = self.back_mut();
        if ret.is_termination() {
            back.make_terminal(num_lanes);
            return Fold::Terminal;
        }
        let offset = (ret.addr.raw() % RAY_BUCKET_SIZE as u64) as usize;
        back.fill(offset, ret.valid_data());
        if back.is_full() {
            Fold::Complete
        } else {
            Fold::Partial
        }
    }

    /// Exchanges roles if back is fully received and front fully drained.
    ///
    /// The new back slot is reset to accept another fill. Returns true if a swap happened.
    pub fn try_swap(&mut self) -> bool {
        if !(self.back().is_full() && self.front().is_drained()) {
            return false;
        }
        self.front ^= 1;
        let back = self.back_mut();
        back.bytes_returned = 0;
        back.requested = false;
        true
    }

    /// Returns true if the back slot is drained and not yet asked to refill.
    ///
    /// Refill is held off while a terminal front still owes lanes their terminal ray.
    pub fn needs_fill(&self) -> bool {
        let back = self.back();
        let terminal_pending = self.front().is_terminal() && !self.front().is_drained();
        !back.requested && back.next_ray == back.num_rays() && !terminal_pending
    }

    /// Marks the back slot as requested and rewinds its drain cursor.
    pub fn mark_requested(&mut self) {
        let back = self.back_mut();
        back.next_ray = 0;
        back.requested = true;
    }

    /// Takes the next ray from the front slot, or `None` if it is drained.
    ///
    /// Returns the ray, the front segment, and whether this was the first ray of the bucket.
    pub fn take_ray(&mut self) -> Option<(BucketRay, u32, bool)> {
        let front = self.front_mut();
        if front.is_drained() {
            return None;
        }
        let index = front.next_ray;
        let ray = front.ray(index);
        front.next_ray += 1;
        Some((ray, front.segment(), index == 0))
    }
}
