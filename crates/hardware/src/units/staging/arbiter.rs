//! Upstream request arbitration.
//!
//! A staging buffer has one scheduler request port and up to four things that want it in a
//! given cycle. At most one is granted, in strict priority order:
//! 1. **Fill:** The back buffer is drained and needs the next bucket.
//! 2. **Store:** A lane's store is latched and must be forwarded as a work item.
//! 3. **Generation Complete:** Every lane finished ray generation and it was not yet announced.
//! 4. **Bucket Complete:** A segment completion is waiting to be announced.

/// Upstream request granted for this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grant {
    /// Send `LOAD_BUCKET`.
    Fill,
    /// Send `STORE_WORKITEM`.
    Store,
    /// Send `BUCKET_COMPLETE` for segment 0.
    GenerationComplete,
    /// Send `BUCKET_COMPLETE` for the oldest completed segment.
    BucketComplete,
}

/// Which upstream requests are eligible this cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Candidates {
    /// Back buffer wants a fill.
    pub fill: bool,
    /// A store is latched.
    pub store: bool,
    /// Generation completion is ready to announce.
    pub generation_complete: bool,
    /// A bucket completion is queued.
    pub bucket_complete: bool,
}

impl Candidates {
    /// Returns true if nothing is eligible.
    pub const fn is_empty(&self) -> bool {
        !(self.fill || self.store || self.generation_complete || self.bucket_complete)
    }
}

/// Picks the highest-priority eligible request, if the port has room.
///
/// # Arguments
///
/// * `candidates` - Eligibility of each request kind.
/// * `port_ready` - Whether the scheduler request port can accept a write.
///
/// # Returns
///
/// The single request to send this cycle, or `None`.
pub const fn arbitrate(candidates: Candidates, port_ready: bool) -> Option<Grant> {
    if !port_ready {
        return None;
    }
    if candidates.fill {
        Some(Grant::Fill)
    } else if candidates.store {
        Some(Grant::Store)
    } else if candidates.generation_complete {
        Some(Grant::GenerationComplete)
    } else if candidates.bucket_complete {
        Some(Grant::BucketComplete)
    } else {
        None
    }
}
