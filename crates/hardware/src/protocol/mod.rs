//! Transaction protocol.
//!
//! Fixed-layout records exchanged between units. This module has no behavior of its own:
//! 1. **Memory:** `MemoryRequest` and `MemoryReturn` with their cache-block payload.
//! 2. **Scheduler:** `StreamSchedulerRequest` and the structural `SfuRequest`.
//! 3. **Work Items:** Bucket rays, work items, and the ray bucket image layout.

/// Memory requests, returns and payloads.
pub mod memory;

/// Stream scheduler and SFU requests.
pub mod scheduler;

/// Bucket rays, work items and ray buckets.
pub mod work_item;

pub use memory::{MemoryRequest, MemoryRequestType, MemoryReturn, Payload};
pub use scheduler::{SchedulerRequestType, SfuRequest, StreamSchedulerRequest};
pub use work_item::{BucketRay, RayBucket, WorkItem};
