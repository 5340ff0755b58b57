//! Ray staging simulator CLI.
//!
//! This binary builds a configuration, initializes the DRAM backend and runs the simulator.
//! It performs:
//! 1. **Configuration:** Loads an optional JSON file, then applies flag overrides.
//! 2. **Setup:** Initializes the DRAM timing backend; a setup failure exits with status 2.
//! 3. **Run:** Ticks until every lane has its terminal ray or the cycle limit is hit, then
//!    prints the requested statistics sections.

use std::path::PathBuf;
use std::process;

use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use raystream_core::config::{Config, DramBackendKind};
use raystream_core::sim::Simulator;
use raystream_core::stats::STATS_SECTIONS;

/// Exit status for a DRAM backend that could not be initialized.
const EXIT_SETUP: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "raysim",
    author,
    version,
    about = "Cycle-accurate ray staging buffer simulator",
    long_about = "Runs synthetic lanes against per-tile ray staging buffers and a bucketing \
                  stream scheduler.\n\nExamples:\n  raysim run --tiles 4 --lanes 8\n  \
                  raysim run --config sim.json --stats summary staging\n  \
                  raysim run --dram-config 1channel.cfg --dram-chip 4Gb_x4.vi"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one simulation.
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// JSON configuration file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of tiles.
    #[arg(long)]
    tiles: Option<usize>,

    /// Lanes per tile.
    #[arg(long)]
    lanes: Option<usize>,

    /// Primary rays per lane.
    #[arg(long)]
    rays: Option<u32>,

    /// Scene segments.
    #[arg(long)]
    segments: Option<u32>,

    /// Secondary rays per primary ray.
    #[arg(long)]
    bounces: Option<u8>,

    /// Cycle limit.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// DRAM system configuration file; selects the row-buffer DRAM model.
    #[arg(long, requires = "dram_chip")]
    dram_config: Option<PathBuf>,

    /// DRAM chip parameter file.
    #[arg(long, requires = "dram_config")]
    dram_chip: Option<PathBuf>,

    /// Statistics sections to print (default: all).
    #[arg(
        long,
        num_args = 1..,
        value_parser = PossibleValuesParser::new(STATS_SECTIONS.iter().copied())
    )]
    stats: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => cmd_run(args),
    }
}

/// Installs the fmt subscriber, honoring `RUST_LOG` before `--verbose`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the configuration from an optional file plus flag overrides.
fn build_config(args: &RunArgs) -> Result<Config, raystream_core::common::ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(tiles) = args.tiles {
        config.general.tiles = tiles;
    }
    if let Some(lanes) = args.lanes {
        config.general.lanes_per_tile = lanes;
    }
    if let Some(max_cycles) = args.max_cycles {
        config.general.max_cycles = max_cycles;
    }
    if let Some(rays) = args.rays {
        config.workload.rays_per_lane = rays;
    }
    if let Some(segments) = args.segments {
        config.workload.segments = segments;
    }
    if let Some(bounces) = args.bounces {
        config.workload.max_bounces = bounces;
    }
    if let (Some(cfg), Some(chip)) = (&args.dram_config, &args.dram_chip) {
        config.dram.backend = DramBackendKind::Usimm;
        config.dram.config_path = Some(cfg.clone());
        config.dram.chip_path = Some(chip.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Runs one simulation and prints its statistics.
///
/// Exits with status 1 on a bad configuration or when the cycle limit is hit, and with
/// [`EXIT_SETUP`] when the DRAM backend can't be initialized.
fn cmd_run(args: RunArgs) {
    let config = build_config(&args).unwrap_or_else(|e| {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let mut sim = Simulator::new(&config).unwrap_or_else(|e| {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(EXIT_SETUP);
    });

    println!(
        "Configuration: {} tiles x {} lanes, {} rays/lane over {} segments, DRAM {:?}",
        config.general.tiles,
        config.general.lanes_per_tile,
        config.workload.rays_per_lane,
        config.workload.segments,
        config.dram.backend
    );

    let stats = sim.run(config.general.max_cycles);
    stats.print_sections(&args.stats);
    if args.stats.is_empty() || args.stats.iter().any(|s| s == "dram") {
        sim.print_dram_stats();
    }

    if !sim.is_finished() {
        eprintln!(
            "[!] cycle limit {} reached with {} lanes unfinished",
            config.general.max_cycles,
            config.general.tiles * config.general.lanes_per_tile - stats.lanes_finished as usize
        );
        process::exit(1);
    }
}
