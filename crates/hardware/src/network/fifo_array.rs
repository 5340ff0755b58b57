//! Point-to-point return queues.
//!
//! A `FifoArray` is a bank of independent bounded FIFOs, one per port. Writes land in a
//! per-port staging slot and only become visible to readers after the next `clock`, so a
//! value written in one phase is never observed in the same phase.

use std::collections::VecDeque;

/// Per-port bounded FIFOs with a one-entry staging slot each.
#[derive(Debug)]
pub struct FifoArray<T> {
    queues: Vec<VecDeque<T>>,
    staged: Vec<Option<T>>,
    depth: usize,
}

impl<T> FifoArray<T> {
    /// Creates `num_ports` FIFOs each holding at most `depth` committed entries.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is zero.
    pub fn new(num_ports: usize, depth: usize) -> Self {
        assert!(depth > 0, "fifo depth must be nonzero");
        Self {
            queues: (0..num_ports).map(|_| VecDeque::with_capacity(depth)).collect(),
            staged: std::iter::repeat_with(|| None).take(num_ports).collect(),
            depth,
        }
    }

    /// Number of ports.
    #[inline]
    pub fn num_ports(&self) -> usize {
        self.queues.len()
    }

    /// Committed entries waiting on `port`.
    #[inline]
    pub fn len(&self, port: usize) -> usize {
        self.queues[port].len()
    }

    /// Returns true if `port` can accept a write this cycle.
    #[inline]
    pub fn is_write_valid(&self, port: usize) -> bool {
        self.staged[port].is_none() && self.queues[port].len() < self.depth
    }

    /// Stages `value` on `port`; it becomes readable after the next `clock`.
    ///
    /// # Panics
    ///
    /// Panics if the port is not write-valid.
    pub fn write(&mut self, value: T, port: usize) {
        assert!(self.is_write_valid(port), "fifo port {port} is full");
        self.staged[port] = Some(value);
    }

    /// Commits every staged entry.
    pub fn clock(&mut self) {
        for (queue, slot) in self.queues.iter_mut().zip(self.staged.iter_mut()) {
            if let Some(value) = slot.take() {
                queue.push_back(value);
            }
        }
    }

    /// Returns true if `port` has a committed entry.
    #[inline]
    pub fn is_read_valid(&self, port: usize) -> bool {
        !self.queues[port].is_empty()
    }

    /// Borrows the oldest committed entry on `port`.
    ///
    /// # Panics
    ///
    /// Panics if the port is empty.
    pub fn peek(&self, port: usize) -> &T {
        match self.queues[port].front() {
            Some(value) => value,
            None => panic!("fifo port {port} is empty"),
        }
    }

    /// Removes the oldest committed entry on `port`.
    ///
    /// # Panics
    ///
    /// Panics if the port is empty.
    pub fn read(&mut self, port: usize) -> T {
        match self.queues[port].pop_front() {
            Some(value) => value,
            None => panic!("fifo port {port} is empty"),
        }
    }

    /// Returns true if every port is empty, staged slots included.
    pub fn is_idle(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty) && self.staged.iter().all(Option::is_none)
    }
}
