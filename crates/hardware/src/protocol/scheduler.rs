//! Stream scheduler and special-function unit request records.

use super::work_item::{BucketRay, WorkItem};

/// Operation carried by a [`StreamSchedulerRequest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SchedulerRequestType {
    /// No operation.
    #[default]
    Na,
    /// Ask for the next bucket of rays to be streamed to the requesting tile.
    LoadBucket,
    /// Every ray of one bucket of `segment` has finished on the requesting tile.
    BucketComplete,
    /// Append a ray to `segment` for later scheduling.
    StoreWorkItem,
}

/// Request sent from a tile's staging buffer to the stream scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamSchedulerRequest {
    /// Operation.
    pub kind: SchedulerRequestType,
    /// Requesting tile.
    pub port: u16,
    /// Segment id; meaningful for `BucketComplete` and `StoreWorkItem`.
    pub segment: u32,
    /// Ray; meaningful for `StoreWorkItem`.
    pub bray: BucketRay,
}

impl StreamSchedulerRequest {
    /// Request for the next bucket.
    pub fn load_bucket(port: u16) -> Self {
        Self {
            kind: SchedulerRequestType::LoadBucket,
            port,
            ..Self::default()
        }
    }

    /// Completion notice for one bucket of `segment`.
    pub fn bucket_complete(port: u16, segment: u32) -> Self {
        Self {
            kind: SchedulerRequestType::BucketComplete,
            port,
            segment,
            ..Self::default()
        }
    }

    /// Forward of a work item produced by a lane.
    pub fn store_work_item(port: u16, item: WorkItem) -> Self {
        Self {
            kind: SchedulerRequestType::StoreWorkItem,
            port,
            segment: item.segment,
            bray: item.bray,
        }
    }
}

/// Routing tuple for special-function unit traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SfuRequest {
    /// Destination register encoding.
    pub dst: u16,
    /// Originating lane.
    pub port: u16,
}
