//! Configuration system for the ray staging simulator.
//!
//! This module defines all configuration structures used to parameterize a run. It provides:
//! 1. **Defaults:** Baseline system shape, queue depths and workload size.
//! 2. **Structures:** Hierarchical config for general, staging, scheduler, DRAM and workload.
//! 3. **Loading:** JSON parsing and validation.
//!
//! Every section and field is optional in JSON; anything omitted takes its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::constants::{INVALID_SEGMENT, MAX_RAYS_PER_BUCKET, RAY_BUCKET_SIZE};
use crate::common::error::ConfigError;

/// Default configuration constants for the simulator.
mod defaults {
    /// Number of tiles (staging buffers).
    pub const TILES: usize = 2;

    /// Lanes per tile.
    pub const LANES_PER_TILE: usize = 4;

    /// Cycle limit for a run.
    pub const MAX_CYCLES: u64 = 1_000_000;

    /// Committed entries per lane return queue.
    pub const STAGING_RETURN_DEPTH: usize = 1;

    /// Work items a staging buffer may hand out per cycle.
    pub const DISPATCH_WIDTH: usize = 1;

    /// Requests per tile the scheduler buffers.
    pub const SCHEDULER_REQUEST_DEPTH: usize = 4;

    /// Returns per tile the scheduler buffers.
    ///
    /// One bucket is 128 cache blocks; a deeper queue lets DRAM run ahead of the tile.
    pub const SCHEDULER_RETURN_DEPTH: usize = 16;

    /// Physical base address of the bucket heap.
    pub const BUCKET_BASE: u64 = 0x1000_0000;

    /// DRAM reads the scheduler may queue per cycle.
    pub const DRAM_ISSUE_WIDTH: usize = 4;

    /// Fixed DRAM latency in cycles.
    pub const DRAM_LATENCY: u64 = 100;

    /// Primary rays generated per lane.
    pub const RAYS_PER_LANE: u32 = 8;

    /// Scene segments.
    pub const SEGMENTS: u32 = 4;

    /// Secondary rays spawned per primary ray.
    pub const MAX_BOUNCES: u8 = 1;

    /// Cycles a lane spends tracing one work item.
    pub const TRACE_LATENCY: u64 = 16;
}

/// DRAM timing backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DramBackendKind {
    /// Fixed latency per access.
    #[default]
    Fixed,
    /// Channel/rank/bank model configured from parameter files.
    #[serde(alias = "USIMM")]
    Usimm,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use raystream_core::config::{Config, DramBackendKind};
///
/// let json = r#"{
///     "general": { "tiles": 4, "lanes_per_tile": 8 },
///     "dram": { "backend": "Fixed", "latency": 40 },
///     "workload": { "segments": 2 }
/// }"#;
///
/// let config = Config::from_json_str(json).unwrap();
/// assert_eq!(config.general.tiles, 4);
/// assert_eq!(config.dram.backend, DramBackendKind::Fixed);
/// assert_eq!(config.workload.segments, 2);
/// assert_eq!(config.staging.dispatch_width, 1);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// System shape and run limits
    #[serde(default)]
    pub general: GeneralConfig,
    /// Staging buffer parameters
    #[serde(default)]
    pub staging: StagingConfig,
    /// Stream scheduler parameters
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// DRAM backend selection and parameters
    #[serde(default)]
    pub dram: DramConfig,
    /// Synthetic workload
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl Config {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed JSON or [`ConfigError::Invalid`] for
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file can't be read, otherwise as
    /// [`Config::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.general.tiles == 0 {
            return invalid("general.tiles must be nonzero".into());
        }
        if !(1..=MAX_RAYS_PER_BUCKET).contains(&self.general.lanes_per_tile) {
            return invalid(format!(
                "general.lanes_per_tile must be 1..={MAX_RAYS_PER_BUCKET}, got {}",
                self.general.lanes_per_tile
            ));
        }
        if self.general.tiles > usize::from(u16::MAX) {
            return invalid(format!("general.tiles {} exceeds the port range", self.general.tiles));
        }
        if self.staging.return_queue_depth == 0 || self.staging.dispatch_width == 0 {
            return invalid("staging queue depth and dispatch width must be nonzero".into());
        }
        if self.scheduler.request_queue_depth == 0
            || self.scheduler.return_queue_depth == 0
            || self.scheduler.dram_issue_width == 0
        {
            return invalid("scheduler queue depths and DRAM issue width must be nonzero".into());
        }
        if self.scheduler.bucket_base % RAY_BUCKET_SIZE as u64 != 0 {
            return invalid(format!(
                "scheduler.bucket_base {:#x} must be aligned to {RAY_BUCKET_SIZE} bytes",
                self.scheduler.bucket_base
            ));
        }
        if self.workload.segments == 0 || self.workload.segments >= INVALID_SEGMENT - 1 {
            return invalid(format!(
                "workload.segments must be 1..{}, got {}",
                INVALID_SEGMENT - 1,
                self.workload.segments
            ));
        }
        if self.dram.backend == DramBackendKind::Usimm
            && (self.dram.config_path.is_none() || self.dram.chip_path.is_none())
        {
            return invalid("the Usimm backend needs dram.config_path and dram.chip_path".into());
        }
        Ok(())
    }
}

/// System shape and run limits.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Number of tiles
    #[serde(default = "GeneralConfig::default_tiles")]
    pub tiles: usize,

    /// Lanes per tile
    #[serde(default = "GeneralConfig::default_lanes_per_tile")]
    pub lanes_per_tile: usize,

    /// Cycle limit for `Simulator::run`
    #[serde(default = "GeneralConfig::default_max_cycles")]
    pub max_cycles: u64,
}

impl GeneralConfig {
    /// Returns the default tile count.
    fn default_tiles() -> usize {
        defaults::TILES
    }

    /// Returns the default lanes per tile.
    fn default_lanes_per_tile() -> usize {
        defaults::LANES_PER_TILE
    }

    /// Returns the default cycle limit.
    fn default_max_cycles() -> u64 {
        defaults::MAX_CYCLES
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            tiles: defaults::TILES,
            lanes_per_tile: defaults::LANES_PER_TILE,
            max_cycles: defaults::MAX_CYCLES,
        }
    }
}

/// Staging buffer parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Committed entries per lane return queue
    #[serde(default = "StagingConfig::default_return_queue_depth")]
    pub return_queue_depth: usize,

    /// Work items handed out per cycle
    #[serde(default = "StagingConfig::default_dispatch_width")]
    pub dispatch_width: usize,
}

impl StagingConfig {
    /// Returns the default lane return queue depth.
    fn default_return_queue_depth() -> usize {
        defaults::STAGING_RETURN_DEPTH
    }

    /// Returns the default dispatch width.
    fn default_dispatch_width() -> usize {
        defaults::DISPATCH_WIDTH
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            return_queue_depth: defaults::STAGING_RETURN_DEPTH,
            dispatch_width: defaults::DISPATCH_WIDTH,
        }
    }
}

/// Stream scheduler parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Requests buffered per tile
    #[serde(default = "SchedulerConfig::default_request_queue_depth")]
    pub request_queue_depth: usize,

    /// Returns buffered per tile
    #[serde(default = "SchedulerConfig::default_return_queue_depth")]
    pub return_queue_depth: usize,

    /// Physical base address of the bucket heap
    #[serde(default = "SchedulerConfig::default_bucket_base")]
    pub bucket_base: u64,

    /// DRAM reads queued per cycle
    #[serde(default = "SchedulerConfig::default_dram_issue_width")]
    pub dram_issue_width: usize,
}

impl SchedulerConfig {
    /// Returns the default request queue depth.
    fn default_request_queue_depth() -> usize {
        defaults::SCHEDULER_REQUEST_DEPTH
    }

    /// Returns the default return queue depth.
    fn default_return_queue_depth() -> usize {
        defaults::SCHEDULER_RETURN_DEPTH
    }

    /// Returns the default bucket heap base.
    fn default_bucket_base() -> u64 {
        defaults::BUCKET_BASE
    }

    /// Returns the default DRAM issue width.
    fn default_dram_issue_width() -> usize {
        defaults::DRAM_ISSUE_WIDTH
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_queue_depth: defaults::SCHEDULER_REQUEST_DEPTH,
            return_queue_depth: defaults::SCHEDULER_RETURN_DEPTH,
            bucket_base: defaults::BUCKET_BASE,
            dram_issue_width: defaults::DRAM_ISSUE_WIDTH,
        }
    }
}

/// DRAM backend selection and parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DramConfig {
    /// Backend type
    #[serde(default)]
    pub backend: DramBackendKind,

    /// Access latency for the `Fixed` backend
    #[serde(default = "DramConfig::default_latency")]
    pub latency: u64,

    /// System configuration file for the `Usimm` backend
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// Chip parameter file for the `Usimm` backend
    #[serde(default)]
    pub chip_path: Option<PathBuf>,
}

impl DramConfig {
    /// Returns the default fixed latency.
    fn default_latency() -> u64 {
        defaults::DRAM_LATENCY
    }
}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            backend: DramBackendKind::Fixed,
            latency: defaults::DRAM_LATENCY,
            config_path: None,
            chip_path: None,
        }
    }
}

/// Synthetic workload driven by the lanes.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Primary rays each lane generates
    #[serde(default = "WorkloadConfig::default_rays_per_lane")]
    pub rays_per_lane: u32,

    /// Scene segments; ids run from 1
    #[serde(default = "WorkloadConfig::default_segments")]
    pub segments: u32,

    /// Secondary rays spawned per primary ray
    #[serde(default = "WorkloadConfig::default_max_bounces")]
    pub max_bounces: u8,

    /// Cycles spent tracing one work item
    #[serde(default = "WorkloadConfig::default_trace_latency")]
    pub trace_latency: u64,
}

impl WorkloadConfig {
    /// Returns the default primary rays per lane.
    fn default_rays_per_lane() -> u32 {
        defaults::RAYS_PER_LANE
    }

    /// Returns the default segment count.
    fn default_segments() -> u32 {
        defaults::SEGMENTS
    }

    /// Returns the default bounce limit.
    fn default_max_bounces() -> u8 {
        defaults::MAX_BOUNCES
    }

    /// Returns the default trace latency.
    fn default_trace_latency() -> u64 {
        defaults::TRACE_LATENCY
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            rays_per_lane: defaults::RAYS_PER_LANE,
            segments: defaults::SEGMENTS,
            max_bounces: defaults::MAX_BOUNCES,
            trace_latency: defaults::TRACE_LATENCY,
        }
    }
}
