//! USIMM-style DRAM channel model.
//!
//! A per-channel memory controller in front of ranks of banks. It models the following:
//! 1. **Queues:** A read queue and a bounded write queue per channel.
//! 2. **Row Buffers:** Open-page banks; a hit costs CAS, a closed bank RCD+CAS, a conflict
//!    RP+RCD+CAS, each followed by one data burst.
//! 3. **Scheduling:** First-ready first-come: the oldest row hit among ready banks, else the
//!    oldest ready access. Writes drain once the write queue is over half full or no read
//!    can issue. One command per channel per cycle.
//! 4. **Power:** Background, activate and burst power from the chip's IDD currents.
//!
//! Refresh, power-down and on-die termination are not modeled.

/// Address decoding and bank state.
pub mod bank;

/// Parameter file parsing.
pub mod params;

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use self::bank::{Bank, RowOutcome, decode};
use self::params::{ParamFile, UsimmParams};
use super::{DramBackend, DramCompletion};
use crate::common::error::SetupError;
use crate::stats::DramStats;

/// One queued access.
#[derive(Clone, Copy, Debug)]
struct Access {
    addr: u64,
    tag: u64,
    rank: usize,
    bank: usize,
    row: u64,
}

/// An issued access waiting for its burst to end.
#[derive(Clone, Copy, Debug)]
struct InFlight {
    done: u64,
    read: Option<DramCompletion>,
}

/// Counters per rank, for power.
#[derive(Clone, Copy, Debug, Default)]
struct RankCounters {
    activates: u64,
    reads: u64,
    writes: u64,
    active_cycles: u64,
}

#[derive(Debug)]
struct Channel {
    read_queue: VecDeque<Access>,
    write_queue: VecDeque<Access>,
    /// Indexed by `rank * banks + bank`.
    banks: Vec<Bank>,
    bus_free_at: u64,
    draining_writes: bool,
    max_read_queue: usize,
    max_write_queue: usize,
    read_queue_accum: u64,
}

impl Channel {
    fn new(num_banks: usize) -> Self {
        Self {
            read_queue: VecDeque::new(),
            write_queue: VecDeque::new(),
            banks: vec![Bank::default(); num_banks],
            bus_free_at: 0,
            draining_writes: false,
            max_read_queue: 0,
            max_write_queue: 0,
            read_queue_accum: 0,
        }
    }

    fn is_idle(&self) -> bool {
        self.read_queue.is_empty() && self.write_queue.is_empty()
    }

    /// Index of the access to issue from `queue`: oldest ready row hit, else oldest ready.
    fn pick(
        queue: &VecDeque<Access>,
        banks: &[Bank],
        banks_per_rank: usize,
        cycle: u64,
    ) -> Option<usize> {
        let mut oldest_ready = None;
        for (i, a) in queue.iter().enumerate() {
            let bank = &banks[a.rank * banks_per_rank + a.bank];
            if !bank.is_ready(cycle) {
                continue;
            }
            if bank.outcome(a.row) == RowOutcome::Hit {
                return Some(i);
            }
            if oldest_ready.is_none() {
                oldest_ready = Some(i);
            }
        }
        oldest_ready
    }
}

/// Row-buffer-aware multi-channel DRAM backend.
#[derive(Debug)]
pub struct UsimmBackend {
    params: UsimmParams,
    cycle: u64,
    channels: Vec<Channel>,
    in_flight: Vec<InFlight>,
    completed: VecDeque<DramCompletion>,
    ranks: Vec<RankCounters>,
    stats: DramStats,
}

impl UsimmBackend {
    /// Initializes the backend from a system configuration file and a chip parameter file.
    ///
    /// The configuration file must define the full address geometry; the chip file usually
    /// carries timing and currents. Either may set any key.
    ///
    /// # Arguments
    ///
    /// * `config_path` - System configuration (channels, ranks, banks, rows, columns, ...).
    /// * `chip_path` - Chip parameter file (timing and IDD currents).
    ///
    /// # Errors
    ///
    /// [`SetupError::MissingConfig`] or [`SetupError::MissingChipParams`] if a file can't be
    /// read, [`SetupError::Parse`] or [`SetupError::MissingParameter`] for bad contents, and
    /// [`SetupError::Geometry`] if the dimensions don't add up to `ADDRESS_BITS`.
    pub fn setup(
        config_path: impl AsRef<Path>,
        chip_path: impl AsRef<Path>,
    ) -> Result<Self, SetupError> {
        let (config_path, chip_path) = (config_path.as_ref(), chip_path.as_ref());
        let mut file = ParamFile::default();
        file.merge_file(config_path, |path, source| SetupError::MissingConfig {
            path,
            source,
        })?;
        let chip_text = fs::read_to_string(chip_path).map_err(|source| {
            SetupError::MissingChipParams {
                path: chip_path.to_path_buf(),
                source,
            }
        })?;
        let _ = UsimmParams::geometry(&file)?;
        file.merge_str(&chip_text, chip_path)?;
        let geometry = UsimmParams::geometry(&file)?;
        let params = UsimmParams::from_file(&file, geometry)?;
        info!(
            channels = geometry.channels(),
            ranks = geometry.ranks(),
            banks = geometry.banks(),
            address_bits = geometry.address_bits,
            "DRAM backend initialized"
        );
        Ok(Self::new(params))
    }

    /// Creates a backend from already validated parameters.
    pub fn new(params: UsimmParams) -> Self {
        let g = params.geometry;
        let banks = g.ranks() * g.banks();
        Self {
            params,
            cycle: 0,
            channels: (0..g.channels()).map(|_| Channel::new(banks)).collect(),
            in_flight: Vec::new(),
            completed: VecDeque::new(),
            ranks: vec![RankCounters::default(); g.channels() * g.ranks()],
            stats: DramStats::default(),
        }
    }

    /// The parameters in effect.
    pub const fn params(&self) -> &UsimmParams {
        &self.params
    }

    /// Cycles elapsed.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    fn enqueue(&mut self, addr: u64, tag: u64, is_write: bool) -> bool {
        let loc = decode(addr, &self.params.geometry);
        let access = Access {
            addr,
            tag,
            rank: loc.rank,
            bank: loc.bank,
            row: loc.row,
        };
        let channel = &mut self.channels[loc.channel];
        let (queue, capacity) = if is_write {
            (&mut channel.write_queue, self.params.wq_capacity)
        } else {
            (&mut channel.read_queue, self.params.rq_capacity)
        };
        if queue.len() >= capacity {
            return false;
        }
        queue.push_back(access);
        channel.max_read_queue = channel.max_read_queue.max(channel.read_queue.len());
        channel.max_write_queue = channel.max_write_queue.max(channel.write_queue.len());
        true
    }

    fn retire(&mut self) {
        let cycle = self.cycle;
        let completed = &mut self.completed;
        self.in_flight.retain(|f| {
            if f.done > cycle {
                return true;
            }
            if let Some(read) = f.read {
                completed.push_back(read);
            }
            false
        });
    }

    fn schedule(&mut self, ch: usize) {
        let cycle = self.cycle;
        let banks_per_rank = self.params.geometry.banks();
        let timing = self.params.timing;
        let half = self.params.wq_capacity / 2;
        let channel = &mut self.channels[ch];

        if channel.write_queue.len() > half {
            channel.draining_writes = true;
        } else if channel.write_queue.is_empty() {
            channel.draining_writes = false;
        }
        let read_pick = Channel::pick(&channel.read_queue, &channel.banks, banks_per_rank, cycle);
        let use_writes = channel.draining_writes || read_pick.is_none();
        let (index, is_write) = if use_writes {
            match Channel::pick(&channel.write_queue, &channel.banks, banks_per_rank, cycle) {
                Some(i) => (i, true),
                None => match read_pick {
                    Some(i) => (i, false),
                    None => return,
                },
            }
        } else {
            match read_pick {
                Some(i) => (i, false),
                None => return,
            }
        };

        let queue = if is_write {
            &mut channel.write_queue
        } else {
            &mut channel.read_queue
        };
        let Some(access) = queue.remove(index) else {
            return;
        };
        let bank = &mut channel.banks[access.rank * banks_per_rank + access.bank];
        let outcome = bank.outcome(access.row);
        let done = (cycle + Bank::latency(outcome, is_write, &timing))
            .max(channel.bus_free_at + timing.t_data_trans);
        bank.occupy(access.row, done);
        channel.bus_free_at = done;

        let rank = &mut self.ranks[ch * self.params.geometry.ranks() + access.rank];
        if outcome == RowOutcome::Hit {
            self.stats.row_hits += 1;
        } else {
            self.stats.row_misses += 1;
            rank.activates += 1;
        }
        if is_write {
            rank.writes += 1;
            self.stats.writes += 1;
        } else {
            rank.reads += 1;
            self.stats.reads += 1;
        }
        self.in_flight.push(InFlight {
            done,
            read: (!is_write).then_some(DramCompletion {
                addr: access.addr,
                tag: access.tag,
            }),
        });
    }

    fn gather_stats(&mut self) {
        let banks_per_rank = self.params.geometry.banks();
        let ranks_per_channel = self.params.geometry.ranks();
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            channel.read_queue_accum += channel.read_queue.len() as u64;
            for r in 0..ranks_per_channel {
                let banks = &channel.banks[r * banks_per_rank..(r + 1) * banks_per_rank];
                if banks.iter().any(Bank::has_open_row) {
                    self.ranks[ch * ranks_per_channel + r].active_cycles += 1;
                }
            }
        }
    }
}

impl DramBackend for UsimmBackend {
    fn clock(&mut self) {
        self.retire();
        for ch in 0..self.channels.len() {
            self.schedule(ch);
        }
        self.gather_stats();
        self.cycle += 1;
    }

    fn is_busy(&self) -> bool {
        !self.channels.iter().all(Channel::is_idle)
    }

    fn insert_read(&mut self, addr: u64, tag: u64) -> bool {
        self.enqueue(addr, tag, false)
    }

    fn insert_write(&mut self, addr: u64) -> bool {
        self.enqueue(addr, 0, true)
    }

    fn pop_completed(&mut self) -> Option<DramCompletion> {
        self.completed.pop_front()
    }

    fn power(&self) -> f64 {
        if self.cycle == 0 {
            return 0.0;
        }
        let p = &self.params.power;
        let t = &self.params.timing;
        let cycles = self.cycle as f64;
        let t_rc = t.t_rc.max(1) as f64;
        let act_current = (p.idd0
            - (p.idd3n * t.t_ras as f64 + p.idd2n * (t_rc - t.t_ras as f64)) / t_rc)
            .max(0.0);
        let milliwatts: f64 = self
            .ranks
            .iter()
            .map(|r| {
                let active = r.active_cycles as f64 / cycles;
                let background = p.vdd * (active * p.idd3n + (1.0 - active) * p.idd2n);
                let activate = p.vdd * act_current * r.activates as f64 * t_rc / cycles;
                let burst = t.t_data_trans as f64 / cycles;
                let read = p.vdd * (p.idd4r - p.idd3n).max(0.0) * r.reads as f64 * burst;
                let write = p.vdd * (p.idd4w - p.idd3n).max(0.0) * r.writes as f64 * burst;
                (background + activate + read + write) * p.chips_per_rank
            })
            .sum();
        milliwatts / 1000.0
    }

    fn stats(&self) -> DramStats {
        DramStats {
            power_watts: self.power(),
            ..self.stats
        }
    }

    fn print_stats(&self, line_size: usize, word_size: usize, cycle_count: u64) {
        let cycles = cycle_count.max(1);
        let s = self.stats();
        let accesses = s.row_hits + s.row_misses;
        let bytes = (s.reads + s.writes) * line_size as u64;
        println!("USIMM DRAM ({} channels)", self.channels.len());
        println!("  dram_cycles            {}", self.cycle);
        println!("  reads                  {}", s.reads);
        println!("  writes                 {}", s.writes);
        println!(
            "  words_transferred      {}",
            bytes / word_size.max(1) as u64
        );
        println!("  bytes_per_cycle        {:.3}", bytes as f64 / cycles as f64);
        if accesses > 0 {
            println!(
                "  row_hit_rate           {:.2}%",
                100.0 * s.row_hits as f64 / accesses as f64
            );
        }
        for (i, ch) in self.channels.iter().enumerate() {
            println!(
                "  ch{i}: avg_rq {:.2} max_rq {} max_wq {}",
                ch.read_queue_accum as f64 / self.cycle.max(1) as f64,
                ch.max_read_queue,
                ch.max_write_queue
            );
        }
        println!("  power                  {:.3} W", s.power_watts);
        debug!(cycles = cycle_count, "DRAM stats printed");
    }
}
