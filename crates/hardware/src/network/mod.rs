//! Interconnect primitives.
//!
//! Units talk through two kinds of port-buffered networks. Both expose the same
//! capacity contract: check `is_write_valid` before writing, `is_read_valid` before reading.
//! 1. **Cascade:** Arbitrating many-to-few request fabric (lanes to a tile unit).
//! 2. **FIFO Array:** Bounded point-to-point queues (returns back to lanes, scheduler ports).

/// Round-robin N-to-M request network.
pub mod cascade;

/// Per-port bounded FIFOs.
pub mod fifo_array;

pub use cascade::Cascade;
pub use fifo_array::FifoArray;
