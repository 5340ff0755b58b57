//! Common utilities and types used throughout the simulator.
//!
//! This module provides the building blocks shared across every unit. It includes:
//! 1. **Address Types:** Strong types for virtual and physical addresses.
//! 2. **Constants:** Cache block and ray bucket sizes and reserved segment ids.
//! 3. **Error Handling:** Setup and configuration errors.

/// Address type definitions (physical, virtual, and tagged).
pub mod addr;

/// System-wide constants.
pub mod constants;

/// Error types.
pub mod error;

pub use addr::{Address, PhysAddr, VirtAddr};
pub use constants::{CACHE_BLOCK_SIZE, INVALID_SEGMENT, RAY_BUCKET_SIZE};
pub use error::{ConfigError, SetupError};
