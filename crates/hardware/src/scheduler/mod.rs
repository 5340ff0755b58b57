//! Stream scheduler.
//!
//! The stream scheduler owns every ray that is not currently on a tile. Staging buffers talk
//! to it through per-tile request and return ports:
//! 1. **Interface:** The `StreamScheduler` port contract every scheduler model implements.
//! 2. **Bucket Scheduler:** A concrete model that gathers work items into per-segment buckets
//!    and streams them to tiles through a DRAM timing backend.

/// Bucketing stream scheduler model.
pub mod bucket_scheduler;

pub use bucket_scheduler::BucketScheduler;

use crate::protocol::memory::MemoryReturn;
use crate::protocol::scheduler::StreamSchedulerRequest;

/// Per-tile port contract of a stream scheduler.
///
/// Callers check `request_port_write_valid` before `write_request` and
/// `return_port_read_valid` before `read_return`; skipping the check is a protocol violation.
pub trait StreamScheduler {
    /// Returns true if `tile` can submit a request this cycle.
    fn request_port_write_valid(&self, tile: usize) -> bool;

    /// Submits a request from `tile`.
    fn write_request(&mut self, request: StreamSchedulerRequest, tile: usize);

    /// Returns true if a return is waiting for `tile`.
    fn return_port_read_valid(&self, tile: usize) -> bool;

    /// Consumes the return waiting for `tile`. A zero-size return is the termination sentinel.
    fn read_return(&mut self, tile: usize) -> MemoryReturn;
}
