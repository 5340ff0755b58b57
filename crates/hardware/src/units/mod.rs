//! Clocked hardware units.
//!
//! 1. **Interfaces:** The two-phase `ClockedUnit` contract and lane-facing `MemoryUnit` ports.
//! 2. **Staging:** The per-tile ray staging buffer.

/// Ray staging buffer.
pub mod staging;

/// Unit traits.
pub mod unit;

pub use staging::UnitRayStagingBuffer;
pub use unit::{ClockedUnit, MemoryUnit};
