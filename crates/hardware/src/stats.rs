//! Simulation statistics collection and reporting.
//!
//! This module tracks what moved through the ray staging path. It provides:
//! 1. **Staging:** Per-tile counters kept by each staging buffer, summed over tiles.
//! 2. **Scheduler:** Bucket traffic seen by the stream scheduler.
//! 3. **DRAM:** Access counts, row-buffer behavior and power reported by the timing backend.
//! 4. **Summary:** Cycles, host time and derived throughput.

use std::ops::AddAssign;
use std::time::Instant;

/// Counters kept by one staging buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StagingStats {
    /// Work items handed to lanes (terminal rays included).
    pub rays_dispatched: u64,
    /// Buckets that became the front buffer.
    pub buckets_swapped_in: u64,
    /// `LOAD_BUCKET` requests sent.
    pub fill_requests: u64,
    /// `STORE_WORKITEM` requests sent.
    pub stores_forwarded: u64,
    /// `BUCKET_COMPLETE` requests sent for real segments.
    pub bucket_completes: u64,
    /// `BUCKET_COMPLETE(0)` requests sent.
    pub generation_completes: u64,
    /// Termination sentinels received.
    pub termination_buckets: u64,
    /// Cycles a dispatch was held back by a full lane return port.
    pub return_stalls: u64,
    /// Cycles an eligible upstream request was held back by a full scheduler port.
    pub upstream_stalls: u64,
}

impl AddAssign for StagingStats {
    fn add_assign(&mut self, rhs: Self) {
        self.rays_dispatched += rhs.rays_dispatched;
        self.buckets_swapped_in += rhs.buckets_swapped_in;
        self.fill_requests += rhs.fill_requests;
        self.stores_forwarded += rhs.stores_forwarded;
        self.bucket_completes += rhs.bucket_completes;
        self.generation_completes += rhs.generation_completes;
        self.termination_buckets += rhs.termination_buckets;
        self.return_stalls += rhs.return_stalls;
        self.upstream_stalls += rhs.upstream_stalls;
    }
}

/// Counters kept by the stream scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Work items received.
    pub work_items_stored: u64,
    /// Buckets sealed (full, or flushed to serve a waiting load).
    pub buckets_sealed: u64,
    /// Buckets streamed to tiles.
    pub buckets_served: u64,
    /// Bucket completions received.
    pub buckets_completed: u64,
    /// Termination sentinels sent.
    pub terminations_sent: u64,
    /// Cycles a DRAM access could not be queued.
    pub dram_stalls: u64,
}

/// Counters reported by a DRAM timing backend.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DramStats {
    /// Reads serviced.
    pub reads: u64,
    /// Writes serviced.
    pub writes: u64,
    /// Accesses that hit an open row.
    pub row_hits: u64,
    /// Accesses that had to open a row.
    pub row_misses: u64,
    /// Average power in watts.
    pub power_watts: f64,
}

/// Section names for selective stats output.
///
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "staging", "scheduler", "dram"];

/// Whole-run statistics.
#[derive(Clone, Debug)]
pub struct SimStats {
    start_time: Instant,
    /// Total simulator cycles elapsed.
    pub cycles: u64,
    /// Number of tiles.
    pub tiles: usize,
    /// Lanes that received their terminal ray.
    pub lanes_finished: u64,
    /// Rays traced by lanes (terminal rays excluded).
    pub rays_traced: u64,
    /// Staging counters summed over all tiles.
    pub staging: StagingStats,
    /// Scheduler counters.
    pub scheduler: SchedulerStats,
    /// DRAM counters.
    pub dram: DramStats,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            tiles: 0,
            lanes_finished: 0,
            rays_traced: 0,
            staging: StagingStats::default(),
            scheduler: SchedulerStats::default(),
            dram: DramStats::default(),
        }
    }
}

impl SimStats {
    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]. Pass an empty slice to
    /// print all sections.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        let cyc = self.cycles.max(1) as f64;

        if want("summary") {
            let khz = (self.cycles as f64 / seconds) / 1000.0;
            println!("\n==========================================================");
            println!("RAY STAGING SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("sim_freq                 {khz:.2} kHz");
            println!("tiles                    {}", self.tiles);
            println!("lanes_finished           {}", self.lanes_finished);
            println!("rays_traced              {}", self.rays_traced);
            println!("rays_per_cycle           {:.4}", self.rays_traced as f64 / cyc);
            println!("----------------------------------------------------------");
        }
        if want("staging") {
            let s = &self.staging;
            println!("STAGING BUFFERS");
            println!("  rays.dispatched        {}", s.rays_dispatched);
            println!("  buckets.swapped_in     {}", s.buckets_swapped_in);
            println!("  upstream.fill          {}", s.fill_requests);
            println!("  upstream.store         {}", s.stores_forwarded);
            println!("  upstream.bucket_done   {}", s.bucket_completes);
            println!("  upstream.rgs_done      {}", s.generation_completes);
            println!("  termination_buckets    {}", s.termination_buckets);
            println!(
                "  stalls.return          {} ({:.2}%)",
                s.return_stalls,
                (s.return_stalls as f64 / cyc) * 100.0
            );
            println!(
                "  stalls.upstream        {} ({:.2}%)",
                s.upstream_stalls,
                (s.upstream_stalls as f64 / cyc) * 100.0
            );
            println!("----------------------------------------------------------");
        }
        if want("scheduler") {
            let s = &self.scheduler;
            println!("STREAM SCHEDULER");
            println!("  work_items.stored      {}", s.work_items_stored);
            println!("  buckets.sealed         {}", s.buckets_sealed);
            println!("  buckets.served         {}", s.buckets_served);
            println!("  buckets.completed      {}", s.buckets_completed);
            println!("  terminations           {}", s.terminations_sent);
            println!("  stalls.dram            {}", s.dram_stalls);
            println!("----------------------------------------------------------");
        }
        if want("dram") {
            let d = &self.dram;
            let accesses = d.row_hits + d.row_misses;
            let hit_rate = if accesses > 0 {
                (d.row_hits as f64 / accesses as f64) * 100.0
            } else {
                0.0
            };
            println!("DRAM");
            println!("  reads                  {}", d.reads);
            println!("  writes                 {}", d.writes);
            println!("  row_hit_rate           {hit_rate:.2}%");
            println!("  power                  {:.3} W", d.power_watts);
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
