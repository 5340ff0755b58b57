//! DRAM Backend Tests.
//!
//! Parameter-file setup of the row-buffer model (every failure mode is reported before the
//! first cycle), plus timing smoke tests for both backends.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use raystream_core::common::error::SetupError;
use raystream_core::config::{DramBackendKind, DramConfig};
use raystream_core::dram::{DramBackend, FixedLatencyBackend, UsimmBackend, build_backend};
use rstest::rstest;
use tempfile::TempDir;

pub const SYSTEM_CFG: &str = "\
// one channel, two ranks
NUM_CHANNELS 1
NUM_RANKS 2
NUM_BANKS 8
NUM_ROWS 32768
NUM_COLUMNS 128
CACHE_LINE_SIZE 64
ADDRESS_BITS 32
WQ_CAPACITY 16
RQ_CAPACITY 16
";

pub const CHIP_VI: &str = "\
T_RCD 44 # activate to read
T_RP 44
T_CAS 44
T_RAS 112
T_DATA_TRANS 16
VDD 1.2
IDD0 55
IDD2N 32
IDD3N 38
IDD4R 157
IDD4W 128
";

/// Parameter files written into a scratch directory.
struct ParamDir {
    dir: TempDir,
}

impl ParamDir {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn drain_one(dram: &mut dyn DramBackend, limit: u64) -> (u64, u64) {
    for cycle in 1..=limit {
        dram.clock();
        if let Some(done) = dram.pop_completed() {
            return (cycle, done.tag);
        }
    }
    panic!("no DRAM completion within {limit} cycles");
}

// ══════════════════════════════════════════════════════════
// 1. Setup failures
// ══════════════════════════════════════════════════════════

#[test]
fn missing_system_config_is_reported() {
    let dir = ParamDir::new();
    let chip = dir.write("chip.vi", CHIP_VI);
    let err = UsimmBackend::setup(dir.missing("nope.cfg"), chip).unwrap_err();
    assert!(matches!(err, SetupError::MissingConfig { .. }), "{err:?}");
    assert!(err.to_string().contains("nope.cfg"));
}

#[test]
fn missing_chip_file_is_reported() {
    let dir = ParamDir::new();
    let cfg = dir.write("system.cfg", SYSTEM_CFG);
    let err = UsimmBackend::setup(cfg, dir.missing("chip.vi")).unwrap_err();
    assert!(matches!(err, SetupError::MissingChipParams { .. }), "{err:?}");
}

#[test]
fn inconsistent_geometry_is_reported() {
    let dir = ParamDir::new();
    let cfg = dir.write(
        "system.cfg",
        &SYSTEM_CFG.replace("ADDRESS_BITS 32", "ADDRESS_BITS 34"),
    );
    let chip = dir.write("chip.vi", CHIP_VI);
    match UsimmBackend::setup(cfg, chip) {
        Err(SetupError::Geometry { needed, configured }) => {
            assert_eq!((needed, configured), (32, 34));
        }
        other => panic!("expected a geometry error, got {other:?}"),
    }
}

#[rstest]
#[case("NUM_BANKS 8", "NUM_BANKS 6")]
#[case("NUM_ROWS 32768", "NUM_ROWS lots")]
#[case("CACHE_LINE_SIZE 64", "CACHE_LINE_SIZE 64 128")]
fn malformed_values_name_their_line(#[case] good: &str, #[case] bad: &str) {
    let dir = ParamDir::new();
    let cfg = dir.write("system.cfg", &SYSTEM_CFG.replace(good, bad));
    let chip = dir.write("chip.vi", CHIP_VI);
    let err = UsimmBackend::setup(cfg, chip).unwrap_err();
    let SetupError::Parse { path, line, .. } = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert!(path.ends_with("system.cfg"));
    let expected = SYSTEM_CFG.lines().position(|l| l == good).unwrap() + 1;
    assert_eq!(*line, expected);
}

#[test]
fn missing_timing_is_reported() {
    let dir = ParamDir::new();
    let cfg = dir.write("system.cfg", SYSTEM_CFG);
    let chip = dir.write("chip.vi", &CHIP_VI.replace("T_CAS 44\n", ""));
    let err = UsimmBackend::setup(cfg, chip).unwrap_err();
    assert!(matches!(err, SetupError::MissingParameter("T_CAS")), "{err:?}");
}

#[test]
fn row_buffer_backend_needs_both_paths() {
    let config = DramConfig {
        backend: DramBackendKind::Usimm,
        ..DramConfig::default()
    };
    let Err(err) = build_backend(&config) else {
        panic!("backend built without parameter files");
    };
    assert!(matches!(err, SetupError::MissingParameter("dram.config_path")), "{err:?}");
}

// ══════════════════════════════════════════════════════════
// 2. Timing
// ══════════════════════════════════════════════════════════

#[test]
fn row_buffer_backend_completes_reads() {
    let dir = ParamDir::new();
    let cfg = dir.write("system.cfg", SYSTEM_CFG);
    let chip = dir.write("chip.vi", CHIP_VI);
    let mut dram = UsimmBackend::setup(cfg, chip).unwrap();
    assert_eq!(dram.params().geometry.channels(), 1);
    assert_eq!(dram.params().timing.t_cas, 44);

    assert!(dram.insert_read(0x1000_0000, 7));
    assert!(dram.insert_read(0x1000_0040, 8));
    assert!(dram.is_busy());
    let (cycle, tag) = drain_one(&mut dram, 1_000);
    assert_eq!(tag, 7);
    assert!(cycle >= 44);
    let (_, tag) = drain_one(&mut dram, 1_000);
    assert_eq!(tag, 8);

    let stats = dram.stats();
    dram.print_stats(64, 8, cycle);
    assert_eq!(stats.reads, 2);
    assert_eq!(stats.row_hits + stats.row_misses, 2);
    assert!(stats.power_watts > 0.0);
}

#[test]
fn full_read_queue_refuses_inserts() {
    let dir = ParamDir::new();
    let cfg = dir.write("system.cfg", SYSTEM_CFG);
    let chip = dir.write("chip.vi", CHIP_VI);
    let mut dram = UsimmBackend::setup(cfg, chip).unwrap();
    for i in 0..16 {
        assert!(dram.insert_read(i * 64, i));
    }
    assert!(!dram.insert_read(16 * 64, 16));
}

#[test]
fn configured_backend_honors_fixed_latency() {
    let config = DramConfig {
        latency: 9,
        ..DramConfig::default()
    };
    let mut dram = build_backend(&config).unwrap();
    assert!(dram.insert_read(0x40, 3));
    assert_eq!(drain_one(dram.as_mut(), 100), (9, 3));
    assert!(!dram.is_busy());
    assert!(dram.power().abs() < f64::EPSILON);
}

#[test]
fn fixed_writes_count_once_retired() {
    let mut dram = FixedLatencyBackend::new(2);
    assert!(dram.insert_write(0));
    dram.clock();
    assert_eq!(dram.stats().writes, 0);
    dram.clock();
    assert_eq!(dram.stats().writes, 1);
    assert!(dram.pop_completed().is_none());
}

#[test]
fn reports_print_before_and_after_traffic() {
    let dir = ParamDir::new();
    let cfg = dir.write("system.cfg", SYSTEM_CFG);
    let chip = dir.write("chip.vi", CHIP_VI);
    let mut usimm = UsimmBackend::setup(cfg, chip).unwrap();
    usimm.print_stats(64, 8, 0);
    assert!(usimm.power().abs() < f64::EPSILON);

    assert!(usimm.insert_read(0x2000, 1));
    assert!(usimm.insert_write(0x4000));
    let (cycle, _) = drain_one(&mut usimm, 1_000);
    usimm.print_stats(64, 8, cycle);
    assert_eq!(usimm.stats().reads, 1);

    let mut fixed: Box<dyn DramBackend> = Box::new(FixedLatencyBackend::new(3));
    fixed.print_stats(64, 8, 0);
    assert!(fixed.insert_read(0, 0));
    let (cycle, _) = drain_one(fixed.as_mut(), 10);
    fixed.print_stats(64, 8, cycle);
    assert_eq!(fixed.stats().reads, 1);
}
