//! Simulation driver.
//!
//! Wires the units together and advances them on the two-phase clock:
//! 1. **Lanes:** Synthetic compute lanes that generate, trace and bounce rays.
//! 2. **Simulator:** Owns every unit and runs rise phases before fall phases each cycle.

/// Synthetic compute lane.
pub mod lane;

/// Top-level simulator.
pub mod simulator;

pub use lane::SyntheticLane;
pub use simulator::Simulator;
