//! DRAM timing backends.
//!
//! The stream scheduler moves buckets through main memory; how long that takes is decided
//! by a pluggable timing backend. This module provides:
//! 1. **Interface:** The `DramBackend` contract (queue an access, clock, collect completions).
//! 2. **Fixed Latency:** Every access takes the same number of cycles; no setup files needed.
//! 3. **USIMM:** Channel/rank/bank model with row buffers and FR-FCFS scheduling, configured
//!    from a system configuration file and a chip parameter file.

/// Fixed-latency backend.
pub mod fixed;

/// Row-buffer-aware channel model.
pub mod usimm;

pub use fixed::FixedLatencyBackend;
pub use usimm::UsimmBackend;

use crate::common::error::SetupError;
use crate::config::{DramBackendKind, DramConfig};
use crate::stats::DramStats;

/// A serviced read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DramCompletion {
    /// Address that was read.
    pub addr: u64,
    /// Caller's tag, returned unchanged.
    pub tag: u64,
}

/// Contract of a DRAM timing model.
///
/// The backend is clocked once per simulated cycle. Reads are tagged by the caller and come
/// back through `pop_completed`; writes are fire-and-forget.
pub trait DramBackend {
    /// Advances the model one cycle: retires finished accesses, then issues new ones.
    fn clock(&mut self);

    /// Returns true while any access is still queued.
    fn is_busy(&self) -> bool;

    /// Queues a read of one cache line. Returns false if the read queue is full.
    fn insert_read(&mut self, addr: u64, tag: u64) -> bool;

    /// Queues a write of one cache line. Returns false if the write queue is full.
    fn insert_write(&mut self, addr: u64) -> bool;

    /// Takes the oldest finished read.
    fn pop_completed(&mut self) -> Option<DramCompletion>;

    /// Average power over the run so far, in watts.
    fn power(&self) -> f64;

    /// Counters so far.
    fn stats(&self) -> DramStats;

    /// Prints a human-readable report to stdout.
    ///
    /// # Arguments
    ///
    /// * `line_size` - Bytes per access.
    /// * `word_size` - Bytes per bus word.
    /// * `cycle_count` - Cycles the run lasted, as seen by the caller.
    fn print_stats(&self, line_size: usize, word_size: usize, cycle_count: u64);
}

/// Builds the backend selected by `config`.
///
/// # Errors
///
/// Returns [`SetupError::MissingParameter`] if the `Usimm` backend is selected without both
/// parameter files, otherwise whatever [`UsimmBackend::setup`] reports.
pub fn build_backend(config: &DramConfig) -> Result<Box<dyn DramBackend>, SetupError> {
    match config.backend {
        DramBackendKind::Fixed => Ok(Box::new(FixedLatencyBackend::new(config.latency))),
        DramBackendKind::Usimm => {
            let config_path = config
                .config_path
                .as_deref()
                .ok_or(SetupError::MissingParameter("dram.config_path"))?;
            let chip_path = config
                .chip_path
                .as_deref()
                .ok_or(SetupError::MissingParameter("dram.chip_path"))?;
            Ok(Box::new(UsimmBackend::setup(config_path, chip_path)?))
        }
    }
}

impl<D: DramBackend + ?Sized> DramBackend for Box<D> {
    fn clock(&mut self) {
        (**self).clock();
    }

    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn insert_read(&mut self, addr: u64, tag: u64) -> bool {
        (**self).insert_read(addr, tag)
    }

    fn insert_write(&mut self, addr: u64) -> bool {
        (**self).insert_write(addr)
    }

    fn pop_completed(&mut self) -> Option<DramCompletion> {
        (**self).pop_completed()
    }

    fn power(&self) -> f64 {
        (**self).power()
    }

    fn stats(&self) -> DramStats {
        (**self).stats()
    }

    fn print_stats(&self, line_size: usize, word_size: usize, cycle_count: u64) {
        (**self).print_stats(line_size, word_size, cycle_count);
    }
}
