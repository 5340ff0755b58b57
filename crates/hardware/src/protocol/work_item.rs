//! Work items and the ray bucket image.
//!
//! A work item is one ray plus the segment it must be traced against. Rays travel from the
//! stream scheduler to a tile in 8 KiB buckets, each bucket bound to a single segment.
//! The ray contents are opaque to the memory path; only their size matters.

use crate::common::constants::{
    BUCKET_RAY_SIZE, MAX_RAYS_PER_BUCKET, RAY_BUCKET_HEADER_SIZE, RAY_BUCKET_NUM_RAYS_OFFSET,
    RAY_BUCKET_SEGMENT_OFFSET, RAY_BUCKET_SIZE, WORK_ITEM_SIZE,
};

/// An opaque ray record as stored in a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BucketRay(pub [u8; BUCKET_RAY_SIZE]);

impl BucketRay {
    /// Reads a ray from the start of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a bucket ray.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut ray = [0u8; BUCKET_RAY_SIZE];
        ray.copy_from_slice(&bytes[..BUCKET_RAY_SIZE]);
        Self(ray)
    }

    /// Ray whose first byte is `tag` and the rest zero. Handy for synthetic workloads.
    pub fn tagged(tag: u8) -> Self {
        let mut ray = [0u8; BUCKET_RAY_SIZE];
        ray[0] = tag;
        Self(ray)
    }
}

impl Default for BucketRay {
    fn default() -> Self {
        Self([0; BUCKET_RAY_SIZE])
    }
}

/// One ray bound to the segment it is to be traced against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WorkItem {
    /// The ray.
    pub bray: BucketRay,
    /// Scene segment.
    pub segment: u32,
}

impl WorkItem {
    /// Creates a work item.
    pub const fn new(bray: BucketRay, segment: u32) -> Self {
        Self { bray, segment }
    }

    /// Wire encoding: the ray followed by the little-endian segment id.
    pub fn to_bytes(&self) -> [u8; WORK_ITEM_SIZE] {
        let mut out = [0u8; WORK_ITEM_SIZE];
        out[..BUCKET_RAY_SIZE].copy_from_slice(&self.bray.0);
        out[BUCKET_RAY_SIZE..].copy_from_slice(&self.segment.to_le_bytes());
        out
    }

    /// Decodes a work item from its wire encoding.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a work item.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(
            bytes.len() >= WORK_ITEM_SIZE,
            "work item needs {WORK_ITEM_SIZE} bytes, got {}",
            bytes.len()
        );
        let bray = BucketRay::from_bytes(bytes);
        let seg = &bytes[BUCKET_RAY_SIZE..WORK_ITEM_SIZE];
        let segment = u32::from_le_bytes([seg[0], seg[1], seg[2], seg[3]]);
        Self { bray, segment }
    }
}

/// Byte offset of ray `index` inside a bucket image.
#[inline]
pub const fn bucket_ray_offset(index: usize) -> usize {
    RAY_BUCKET_HEADER_SIZE + index * BUCKET_RAY_SIZE
}

/// A bucket of rays under construction or in transit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RayBucket {
    /// Address of the next bucket in a chain; opaque to the staging path.
    pub next_bucket: u64,
    /// Segment every ray in this bucket belongs to.
    pub segment: u32,
    /// The rays.
    pub rays: Vec<BucketRay>,
}

impl RayBucket {
    /// Creates an empty bucket for `segment`.
    pub fn new(segment: u32) -> Self {
        Self {
            next_bucket: 0,
            segment,
            rays: Vec::new(),
        }
    }

    /// Returns true if no further ray fits.
    pub fn is_full(&self) -> bool {
        self.rays.len() >= MAX_RAYS_PER_BUCKET
    }

    /// Number of rays held.
    pub fn len(&self) -> usize {
        self.rays.len()
    }

    /// Returns true if the bucket holds no rays.
    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    /// Appends a ray.
    ///
    /// # Panics
    ///
    /// Panics if the bucket is full.
    pub fn push(&mut self, ray: BucketRay) {
        assert!(!self.is_full(), "ray bucket overflow");
        self.rays.push(ray);
    }

    /// Encodes the bucket into its fixed 8 KiB image. Unused ray slots are zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut image = vec![0u8; RAY_BUCKET_SIZE];
        image[..8].copy_from_slice(&self.next_bucket.to_le_bytes());
        image[RAY_BUCKET_SEGMENT_OFFSET..RAY_BUCKET_SEGMENT_OFFSET + 4]
            .copy_from_slice(&self.segment.to_le_bytes());
        image[RAY_BUCKET_NUM_RAYS_OFFSET..RAY_BUCKET_NUM_RAYS_OFFSET + 4]
            .copy_from_slice(&(self.rays.len() as u32).to_le_bytes());
        for (i, ray) in self.rays.iter().enumerate() {
            let off = bucket_ray_offset(i);
            image[off..off + BUCKET_RAY_SIZE].copy_from_slice(&ray.0);
        }
        image
    }
}
