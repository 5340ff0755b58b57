//! Simulator: owns the lanes, staging buffers and stream scheduler side by side.
//!
//! Units never hold references to each other. Each phase call is handed the one
//! collaborator it talks to, so every borrow is split at the call site.

use std::fmt;

use tracing::{info, warn};

use super::lane::SyntheticLane;
use crate::common::constants::CACHE_BLOCK_SIZE;
use crate::common::error::SetupError;
use crate::config::Config;
use crate::dram::{DramBackend, build_backend};
use crate::scheduler::BucketScheduler;
use crate::stats::{DramStats, SimStats, StagingStats};
use crate::units::staging::UnitRayStagingBuffer;
use crate::units::unit::ClockedUnit;

/// Bytes per DRAM bus word in backend reports.
const DRAM_WORD_SIZE: usize = 8;

/// Top-level simulator: lanes, one staging buffer per tile, and the stream scheduler.
pub struct Simulator {
    /// Lanes of each tile.
    pub lanes: Vec<Vec<SyntheticLane>>,
    /// Staging buffer of each tile.
    pub staging: Vec<UnitRayStagingBuffer>,
    /// Stream scheduler shared by all tiles.
    pub scheduler: BucketScheduler<Box<dyn DramBackend>>,
    cycle: u64,
}

impl Simulator {
    /// Creates a simulator, initializing the configured DRAM backend.
    ///
    /// # Errors
    ///
    /// Returns the [`SetupError`] of the DRAM backend; no cycle has run at that point.
    pub fn new(config: &Config) -> Result<Self, SetupError> {
        let dram = build_backend(&config.dram)?;
        Ok(Self::with_backend(config, dram))
    }

    /// Creates a simulator around an already built DRAM backend.
    ///
    /// # Panics
    ///
    /// Panics if `config` has no tiles or an unusable lane count; run
    /// [`Config::validate`] first.
    pub fn with_backend(config: &Config, dram: Box<dyn DramBackend>) -> Self {
        let tiles = config.general.tiles;
        let lanes_per_tile = config.general.lanes_per_tile;
        let lanes = (0..tiles)
            .map(|tile| {
                (0..lanes_per_tile)
                    .map(|port| {
                        let id = (tile * lanes_per_tile + port) as u32;
                        SyntheticLane::new(port, id, &config.workload)
                    })
                    .collect()
            })
            .collect();
        let staging = (0..tiles)
            .map(|tile| UnitRayStagingBuffer::new(tile, lanes_per_tile, &config.staging))
            .collect();
        info!(tiles, lanes_per_tile, "simulator built");
        Self {
            lanes,
            staging,
            scheduler: BucketScheduler::new(tiles, &config.scheduler, dram),
            cycle: 0,
        }
    }

    /// Cycles simulated so far.
    #[inline]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Advances every unit by one cycle.
    ///
    /// All rise phases run before any fall phase, each in the order lanes, staging
    /// buffers, scheduler.
    pub fn tick(&mut self) {
        for (lanes, staging) in self.lanes.iter_mut().zip(&mut self.staging) {
            for lane in lanes {
                lane.clock_rise(staging);
            }
        }
        for staging in &mut self.staging {
            staging.clock_rise(&mut self.scheduler);
        }
        self.scheduler.clock_rise(&mut ());

        for (lanes, staging) in self.lanes.iter_mut().zip(&mut self.staging) {
            for lane in lanes {
                lane.clock_fall(staging);
            }
        }
        for staging in &mut self.staging {
            staging.clock_fall(&mut self.scheduler);
        }
        self.scheduler.clock_fall(&mut ());

        self.cycle += 1;
    }

    /// Returns true once every lane has its terminal ray and DRAM is idle.
    pub fn is_finished(&self) -> bool {
        self.lanes.iter().flatten().all(SyntheticLane::is_finished)
            && !self.scheduler.dram().is_busy()
    }

    /// Ticks until finished or `max_cycles` have elapsed in total.
    ///
    /// # Returns
    ///
    /// Statistics for the run so far.
    pub fn run(&mut self, max_cycles: u64) -> SimStats {
        let mut stats = SimStats::default();
        while !self.is_finished() && self.cycle < max_cycles {
            self.tick();
        }
        if self.is_finished() {
            info!(cycles = self.cycle, "simulation finished");
        } else {
            warn!(cycles = self.cycle, "cycle limit reached before all lanes finished");
        }
        self.fill_stats(&mut stats);
        stats
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> SimStats {
        let mut stats = SimStats::default();
        self.fill_stats(&mut stats);
        stats
    }

    /// Prints the DRAM backend's own report for the cycles run so far.
    pub fn print_dram_stats(&self) {
        self.scheduler
            .dram()
            .print_stats(CACHE_BLOCK_SIZE, DRAM_WORD_SIZE, self.cycle);
    }

    fn fill_stats(&self, stats: &mut SimStats) {
        let lanes = || self.lanes.iter().flatten();
        stats.cycles = self.cycle;
        stats.tiles = self.staging.len();
        stats.lanes_finished = lanes().filter(|l| l.is_finished()).count() as u64;
        stats.rays_traced = lanes().map(SyntheticLane::rays_traced).sum();
        stats.staging = self
            .staging
            .iter()
            .fold(StagingStats::default(), |mut acc, s| {
                acc += *s.stats();
                acc
            });
        stats.scheduler = *self.scheduler.stats();
        let dram = self.scheduler.dram();
        stats.dram = DramStats {
            power_watts: dram.power(),
            ..dram.stats()
        };
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("cycle", &self.cycle)
            .field("tiles", &self.staging.len())
            .field("staging", &self.staging)
            .finish_non_exhaustive()
    }
}
