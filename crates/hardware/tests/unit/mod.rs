//! # Unit Components
//!
//! Tests grouped by the component they exercise, from the wire records up to a whole
//! simulated system.



/// Front/back bucket slots.
pub mod bucket_buffer;

/// Per-segment ray counting.
pub mod segment_tracker;



/// Bucketing stream scheduler.
pub mod scheduler;

/// DRAM backends and parameter-file setup.
pub mod dram;

/// Configuration defaults, parsing and validation.
pub mod config;
