//! Ray staging buffer simulator library.
//!
//! This crate implements a cycle-accurate model of the path that feeds rays to ray tracing
//! tiles, with the following:
//! 1. **Protocol:** Memory requests/returns, stream scheduler requests, work items and the
//!    ray bucket image.
//! 2. **Units:** The two-phase clocked unit contract and the per-tile ray staging buffer
//!    (double-buffered buckets, segment lifecycle, upstream arbitration).
//! 3. **Scheduler:** A bucketing stream scheduler that streams buckets through DRAM.
//! 4. **DRAM:** Fixed-latency and row-buffer-aware timing backends.
//! 5. **Simulation:** Synthetic lanes, the driver, configuration and statistics.

/// Common types and constants (addresses, bucket layout, errors).
pub mod common;
/// Simulator configuration (defaults and hierarchical config structures).
pub mod config;
/// DRAM timing backends.
pub mod dram;
/// Port-buffered interconnect primitives.
pub mod network;
/// Transaction records exchanged between units.
pub mod protocol;
/// Stream scheduler interface and bucketing model.
pub mod scheduler;
/// Synthetic lanes and the simulation driver.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;
/// Clocked units (staging buffer).
pub mod units;

/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// Top-level simulator; construct with `Simulator::new`.
pub use crate::sim::Simulator;
/// Per-tile ray staging buffer.
pub use crate::units::UnitRayStagingBuffer;
