//! Memory request and return records.
//!
//! These are the transactions exchanged between lanes and memory-side units. Each carries a
//! cache-block-sized payload of which only the first `size` bytes are meaningful:
//! 1. **Payload:** Fixed 64-byte buffer viewable as bytes or little-endian scalars.
//! 2. **Requests:** Loads, stores and atomics issued by a lane.
//! 3. **Returns:** Data sent back to a lane (or to a unit) satisfying a request.
//!
//! Copy-assignment (`clone_from`) moves only the valid prefix and leaves the tail of the
//! destination as it was. Nothing downstream may depend on bytes past `size`.

use crate::common::addr::Address;
use crate::common::constants::CACHE_BLOCK_SIZE;

/// Operation carried by a [`MemoryRequest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryRequestType {
    /// No operation; the request slot is empty.
    #[default]
    Na,
    /// Read `size` bytes.
    Load,
    /// Write `size` bytes under `write_mask`.
    Store,
    /// Atomic add.
    AmoAdd,
    /// Atomic exclusive or.
    AmoXor,
    /// Atomic or.
    AmoOr,
    /// Atomic and.
    AmoAnd,
    /// Atomic signed minimum.
    AmoMin,
    /// Atomic signed maximum.
    AmoMax,
    /// Atomic unsigned minimum.
    AmoMinu,
    /// Atomic unsigned maximum.
    AmoMaxu,
}

impl MemoryRequestType {
    /// Returns true for the read-modify-write operations.
    pub const fn is_amo(self) -> bool {
        matches!(
            self,
            Self::AmoAdd
                | Self::AmoXor
                | Self::AmoOr
                | Self::AmoAnd
                | Self::AmoMin
                | Self::AmoMax
                | Self::AmoMinu
                | Self::AmoMaxu
        )
    }
}

/// One cache block of transaction data.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    bytes: [u8; CACHE_BLOCK_SIZE],
}

impl Payload {
    /// Returns an all-zero payload.
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; CACHE_BLOCK_SIZE],
        }
    }

    /// Raw byte view of the whole block.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; CACHE_BLOCK_SIZE] {
        &self.bytes
    }

    /// Mutable raw byte view of the whole block.
    #[inline]
    pub const fn as_bytes_mut(&mut self) -> &mut [u8; CACHE_BLOCK_SIZE] {
        &mut self.bytes
    }

    /// Copies `src` into the start of the block, leaving the rest untouched.
    ///
    /// # Panics
    ///
    /// Panics if `src` is longer than a cache block.
    #[inline]
    pub fn copy_prefix_from(&mut self, src: &[u8]) {
        assert!(
            src.len() <= CACHE_BLOCK_SIZE,
            "payload of {} bytes exceeds cache block",
            src.len()
        );
        self.bytes[..src.len()].copy_from_slice(src);
    }

    /// First byte of the block.
    #[inline]
    pub const fn u8(&self) -> u8 {
        self.bytes[0]
    }

    /// First two bytes of the block, little endian.
    #[inline]
    pub const fn u16(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    /// First four bytes of the block, little endian.
    #[inline]
    pub const fn u32(&self) -> u32 {
        u32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// First eight bytes of the block, little endian.
    #[inline]
    pub const fn u64(&self) -> u64 {
        let b = &self.bytes;
        u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// Writes a little-endian u64 to the start of the block.
    #[inline]
    pub fn set_u64(&mut self, val: u64) {
        self.bytes[..8].copy_from_slice(&val.to_le_bytes());
    }

    /// Writes a little-endian u32 to the start of the block.
    #[inline]
    pub fn set_u32(&mut self, val: u32) {
        self.bytes[..4].copy_from_slice(&val.to_le_bytes());
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payload({:02x?})", &self.bytes[..8])
    }
}

/// A memory transaction issued by a lane.
#[derive(Debug)]
pub struct MemoryRequest {
    /// Operation to perform.
    pub kind: MemoryRequestType,
    /// Number of valid payload bytes (at most one cache block).
    pub size: u8,
    /// Destination register encoding; opaque to the memory system.
    pub dst: u16,
    /// Originating lane.
    pub port: u16,
    /// Per-byte write enable for stores and atomics.
    pub write_mask: u64,
    /// Target address.
    pub addr: Address,
    /// Payload; only the first `size` bytes are defined.
    pub data: Payload,
}

impl MemoryRequest {
    /// Creates a request with an empty payload.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds one cache block.
    pub fn new(kind: MemoryRequestType, port: u16, addr: Address, size: u8) -> Self {
        assert!(
            size as usize <= CACHE_BLOCK_SIZE,
            "request size {size} exceeds cache block"
        );
        Self {
            kind,
            size,
            dst: 0,
            port,
            write_mask: 0,
            addr,
            data: Payload::zeroed(),
        }
    }

    /// Creates a load of `size` bytes.
    pub fn load(port: u16, addr: Address, size: u8) -> Self {
        Self::new(MemoryRequestType::Load, port, addr, size)
    }

    /// Creates a store of `bytes`, enabling every byte written.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than one cache block.
    pub fn store(port: u16, addr: Address, bytes: &[u8]) -> Self {
        let mut req = Self::new(MemoryRequestType::Store, port, addr, bytes.len() as u8);
        req.data.copy_prefix_from(bytes);
        req.write_mask = byte_mask(bytes.len());
        req
    }

    /// The valid part of the payload.
    #[inline]
    pub fn valid_data(&self) -> &[u8] {
        &self.data.as_bytes()[..self.size as usize]
    }
}

impl Clone for MemoryRequest {
    /// Copies the header and the valid payload prefix.
    ///
    /// A fresh copy needs some value past `size`, so its tail is zeroed. Readers must still
    /// treat it as undefined; `clone_from` leaves the destination's tail untouched.
    fn clone(&self) -> Self {
        let mut data = Payload::zeroed();
        data.copy_prefix_from(self.valid_data());
        Self {
            kind: self.kind,
            size: self.size,
            dst: self.dst,
            port: self.port,
            write_mask: self.write_mask,
            addr: self.addr,
            data,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.kind = source.kind;
        self.size = source.size;
        self.dst = source.dst;
        self.port = source.port;
        self.write_mask = source.write_mask;
        self.addr = source.addr;
        self.data.copy_prefix_from(source.valid_data());
    }
}

/// Data returned for a memory transaction.
#[derive(Debug)]
pub struct MemoryReturn {
    /// Number of valid payload bytes. Zero on a scheduler return marks termination.
    pub size: u8,
    /// Destination register encoding copied from the request.
    pub dst: u16,
    /// Port the return is delivered to.
    pub port: u16,
    /// Address the data belongs to.
    pub addr: Address,
    /// Payload; only the first `size` bytes are defined.
    pub data: Payload,
}

impl MemoryReturn {
    /// Creates a return carrying `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than one cache block.
    pub fn new(port: u16, dst: u16, addr: Address, bytes: &[u8]) -> Self {
        let mut data = Payload::zeroed();
        data.copy_prefix_from(bytes);
        Self {
            size: bytes.len() as u8,
            dst,
            port,
            addr,
            data,
        }
    }

    /// Satisfies `request` with data read from `src`.
    ///
    /// Size, destination, port and address are inherited from the request and the first
    /// `request.size` bytes of `src` become the payload.
    ///
    /// # Panics
    ///
    /// Panics if `src` holds fewer than `request.size` bytes.
    pub fn from_request(request: &MemoryRequest, src: &[u8]) -> Self {
        let size = request.size as usize;
        assert!(
            src.len() >= size,
            "source of {} bytes can't satisfy a {size}-byte request",
            src.len()
        );
        let mut data = Payload::zeroed();
        data.copy_prefix_from(&src[..size]);
        Self {
            size: request.size,
            dst: request.dst,
            port: request.port,
            addr: request.addr,
            data,
        }
    }

    /// The empty return a scheduler sends once no more work exists.
    pub fn termination(port: u16) -> Self {
        Self::new(port, 0, Address::default(), &[])
    }

    /// Returns true if this is a termination return.
    #[inline]
    pub const fn is_termination(&self) -> bool {
        self.size == 0
    }

    /// The valid part of the payload.
    #[inline]
    pub fn valid_data(&self) -> &[u8] {
        &self.data.as_bytes()[..self.size as usize]
    }
}

impl Clone for MemoryReturn {
    /// Copies the header and the valid payload prefix.
    ///
    /// A fresh copy needs some value past `size`, so its tail is zeroed. Readers must still
    /// treat it as undefined; `clone_from` leaves the destination's tail untouched.
    fn clone(&self) -> Self {
        let mut data = Payload::zeroed();
        data.copy_prefix_from(self.valid_data());
        Self {
            size: self.size,
            dst: self.dst,
            port: self.port,
            addr: self.addr,
            data,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.size = source.size;
        self.dst = source.dst;
        self.port = source.port;
        self.addr = source.addr;
        self.data.copy_prefix_from(source.valid_data());
    }
}

/// Write mask enabling the low `len` bytes.
#[inline]
pub const fn byte_mask(len: usize) -> u64 {
    if len >= 64 { u64::MAX } else { (1u64 << len) - 1 }
}
