//! Global System Constants.
//!
//! This module defines the system-wide sizes that bound every payload crossing a port.
//! Producers and consumers must agree on these bit-for-bit:
//! 1. **Transaction Constants:** Cache block size, the maximum payload of one transaction.
//! 2. **Bucket Constants:** Ray bucket size and its header/ray layout.
//! 3. **Sentinel Values:** Reserved segment ids used by the bucket protocol.

/// Size of one cache block in bytes; the largest payload a single transaction carries.
pub const CACHE_BLOCK_SIZE: usize = 64;

/// Size of one ray bucket in bytes (8 KiB).
pub const RAY_BUCKET_SIZE: usize = 8 * 1024;

/// Size of the ray bucket header (`next_bucket`, `segment`, `num_rays`).
pub const RAY_BUCKET_HEADER_SIZE: usize = 16;

/// Byte offset of the `segment` field in a ray bucket image.
pub const RAY_BUCKET_SEGMENT_OFFSET: usize = 8;

/// Byte offset of the `num_rays` field in a ray bucket image.
pub const RAY_BUCKET_NUM_RAYS_OFFSET: usize = 12;

/// Size of one bucket ray record in bytes.
pub const BUCKET_RAY_SIZE: usize = 48;

/// Size of a work item (bucket ray followed by a u32 segment id).
pub const WORK_ITEM_SIZE: usize = BUCKET_RAY_SIZE + 4;

/// Number of bucket rays that fit in one ray bucket.
pub const MAX_RAYS_PER_BUCKET: usize = (RAY_BUCKET_SIZE - RAY_BUCKET_HEADER_SIZE) / BUCKET_RAY_SIZE;

/// Number of cache-block transfers needed to move one ray bucket.
pub const BLOCKS_PER_BUCKET: usize = RAY_BUCKET_SIZE / CACHE_BLOCK_SIZE;

/// Segment id carried by the termination bucket.
pub const INVALID_SEGMENT: u32 = u32::MAX;

/// Segment id announced once every lane of a tile has finished ray generation.
pub const RAY_GENERATION_SEGMENT: u32 = 0;

const _: () = assert!(WORK_ITEM_SIZE <= CACHE_BLOCK_SIZE);
const _: () = assert!(RAY_BUCKET_SIZE % CACHE_BLOCK_SIZE == 0);
