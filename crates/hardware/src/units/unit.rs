//! Clocked Unit Interfaces.
//!
//! Every simulated unit advances in two phases per cycle:
//! 1. **Rise:** Ingest only. Clock inbound networks and latch what has arrived.
//! 2. **Fall:** Decide and emit, using only state as of the end of the rise phase, then
//!    clock outbound networks.
//!
//! The driver calls every unit's rise phase before any unit's fall phase, so a value
//! emitted during one fall is first observed in the following cycle's rise.

use crate::protocol::memory::{MemoryRequest, MemoryReturn};

/// A unit driven by the two-phase clock.
///
/// `Ctx` is whatever the unit talks to outside its own state (its upstream scheduler, the
/// memory unit a lane is attached to). The driver passes it in on every phase.
pub trait ClockedUnit<Ctx: ?Sized> {
    /// Rise phase: observe.
    ///
    /// # Arguments
    ///
    /// * `ctx` - External collaborator this unit reads from.
    fn clock_rise(&mut self, ctx: &mut Ctx);

    /// Fall phase: act.
    ///
    /// # Arguments
    ///
    /// * `ctx` - External collaborator this unit writes to.
    fn clock_fall(&mut self, ctx: &mut Ctx);
}

/// Lane-facing transaction ports of a memory-side unit.
///
/// Callers must check the matching `*_valid` method first; writing a full port or reading
/// an empty one is a protocol violation and panics.
pub trait MemoryUnit {
    /// Returns true if `port` can accept a request this cycle.
    fn request_port_write_valid(&self, port: usize) -> bool;

    /// Submits a request on `port`.
    fn write_request(&mut self, request: MemoryRequest, port: usize);

    /// Returns true if a return is waiting on `port`.
    fn return_port_read_valid(&self, port: usize) -> bool;

    /// Borrows the return waiting on `port` without consuming it.
    fn peek_return(&self, port: usize) -> &MemoryReturn;

    /// Consumes the return waiting on `port`.
    fn read_return(&mut self, port: usize) -> MemoryReturn;
}
