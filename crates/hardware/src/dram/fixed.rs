//! Fixed-latency DRAM backend.
//!
//! Every access completes exactly `latency` cycles after it is queued. Queues are unbounded,
//! so `insert_read` and `insert_write` always succeed.

use std::collections::VecDeque;

use super::{DramBackend, DramCompletion};
use crate::stats::DramStats;

/// DRAM model where every access takes the same number of cycles.
#[derive(Debug)]
pub struct FixedLatencyBackend {
    latency: u64,
    cycle: u64,
    /// Reads in flight with their completion cycle, in issue order.
    reads: VecDeque<(u64, DramCompletion)>,
    /// Completion cycles of writes in flight.
    writes: VecDeque<u64>,
    completed: VecDeque<DramCompletion>,
    stats: DramStats,
}

impl FixedLatencyBackend {
    /// Creates a backend with the given latency in cycles.
    ///
    /// # Arguments
    ///
    /// * `latency` - Cycles per access.
    ///
    /// # Returns
    ///
    /// A new `FixedLatencyBackend` with nothing queued.
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            cycle: 0,
            reads: VecDeque::new(),
            writes: VecDeque::new(),
            completed: VecDeque::new(),
            stats: DramStats::default(),
        }
    }

    /// Configured latency in cycles.
    pub const fn latency(&self) -> u64 {
        self.latency
    }
}

impl DramBackend for FixedLatencyBackend {
    fn clock(&mut self) {
        self.cycle += 1;
        while let Some(&(done, completion)) = self.reads.front() {
            if done > self.cycle {
                break;
            }
            let _ = self.reads.pop_front();
            self.completed.push_back(completion);
            self.stats.reads += 1;
        }
        while self.writes.front().is_some_and(|&done| done <= self.cycle) {
            let _ = self.writes.pop_front();
            self.stats.writes += 1;
        }
    }

    fn is_busy(&self) -> bool {
        !self.reads.is_empty() || !self.writes.is_empty()
    }

    fn insert_read(&mut self, addr: u64, tag: u64) -> bool {
        self.reads
            .push_back((self.cycle + self.latency, DramCompletion { addr, tag }));
        true
    }

    fn insert_write(&mut self, _addr: u64) -> bool {
        self.writes.push_back(self.cycle + self.latency);
        true
    }

    fn pop_completed(&mut self) -> Option<DramCompletion> {
        self.completed.pop_front()
    }

    fn power(&self) -> f64 {
        0.0
    }

    fn stats(&self) -> DramStats {
        self.stats
    }

    fn print_stats(&self, line_size: usize, _word_size: usize, cycle_count: u64) {
        let bytes = (self.stats.reads + self.stats.writes) * line_size as u64;
        println!("DRAM (fixed latency {} cycles)", self.latency);
        println!("  reads                  {}", self.stats.reads);
        println!("  writes                 {}", self.stats.writes);
        println!(
            "  bandwidth              {:.2} B/cycle",
            bytes as f64 / cycle_count.max(1) as f64
        );
    }
}
