//! Physical and Virtual Address types.
//!
//! This module defines strong types for the two address spaces a memory transaction may
//! carry. It provides the following:
//! 1. **Type Safety:** Distinguishes between virtual and physical addresses at compile time.
//! 2. **Tagged Interpretation:** `Address` records which space a transaction's address is in,
//!    so a field is never read as both at once.
//! 3. **Bucket Addressing:** Helpers for locating a byte within a cache block or ray bucket.

use super::constants::{CACHE_BLOCK_SIZE, RAY_BUCKET_SIZE};

/// A virtual address as issued by a compute lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(pub u64);

/// A physical address as seen by the memory system and the stream scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Creates a new virtual address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }
}

impl PhysAddr {
    /// Creates a new physical address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Byte offset of this address within its ray bucket.
    #[inline]
    pub const fn bucket_offset(&self) -> usize {
        (self.0 % RAY_BUCKET_SIZE as u64) as usize
    }

    /// Address of the cache block containing this address.
    #[inline]
    pub const fn block_base(&self) -> Self {
        Self(self.0 & !(CACHE_BLOCK_SIZE as u64 - 1))
    }
}

/// Address carried by a memory transaction.
///
/// A transaction's address is either physical or virtual depending on where in the
/// memory path it is observed. Consumers that need one interpretation ask for it
/// explicitly; `raw` yields the bits regardless of space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    /// Physical address (after translation, or for units addressed physically).
    Phys(PhysAddr),
    /// Virtual address (as issued by a lane).
    Virt(VirtAddr),
}

impl Address {
    /// Returns the raw address bits regardless of address space.
    #[inline]
    pub const fn raw(&self) -> u64 {
        match self {
            Self::Phys(p) => p.0,
            Self::Virt(v) => v.0,
        }
    }

    /// Returns the physical address, if this is one.
    #[inline]
    pub const fn phys(&self) -> Option<PhysAddr> {
        match self {
            Self::Phys(p) => Some(*p),
            Self::Virt(_) => None,
        }
    }

    /// Returns the virtual address, if this is one.
    #[inline]
    pub const fn virt(&self) -> Option<VirtAddr> {
        match self {
            Self::Virt(v) => Some(*v),
            Self::Phys(_) => None,
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::Phys(PhysAddr(0))
    }
}

impl From<PhysAddr> for Address {
    fn from(addr: PhysAddr) -> Self {
        Self::Phys(addr)
    }
}

impl From<VirtAddr> for Address {
    fn from(addr: VirtAddr) -> Self {
        Self::Virt(addr)
    }
}
