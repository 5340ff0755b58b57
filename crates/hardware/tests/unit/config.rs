//! Configuration Tests.
//!
//! Defaults, partial JSON documents, and the validation that guards the simulator
//! constructors.

use std::fs;

use pretty_assertions::assert_eq;
use raystream_core::common::error::ConfigError;
use raystream_core::config::{Config, DramBackendKind};
use rstest::rstest;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.general.tiles, 2);
    assert_eq!(config.general.lanes_per_tile, 4);
    assert_eq!(config.staging.return_queue_depth, 1);
    assert_eq!(config.staging.dispatch_width, 1);
    assert_eq!(config.scheduler.bucket_base, 0x1000_0000);
    assert_eq!(config.dram.backend, DramBackendKind::Fixed);
    assert_eq!(config.dram.latency, 100);
    assert!(config.dram.config_path.is_none());
}

#[test]
fn empty_document_takes_every_default() {
    let config = Config::from_json_str("{}").unwrap();
    assert_eq!(config.workload.rays_per_lane, 8);
    assert_eq!(config.workload.segments, 4);
    assert_eq!(config.workload.max_bounces, 1);
    assert_eq!(config.scheduler.return_queue_depth, 16);
}

#[test]
fn partial_sections_keep_sibling_defaults() {
    let json = r#"{
        "scheduler": { "dram_issue_width": 2 },
        "workload": { "trace_latency": 3 }
    }"#;
    let config = Config::from_json_str(json).unwrap();
    assert_eq!(config.scheduler.dram_issue_width, 2);
    assert_eq!(config.scheduler.request_queue_depth, 4);
    assert_eq!(config.workload.trace_latency, 3);
    assert_eq!(config.workload.rays_per_lane, 8);
}

#[rstest]
#[case("Usimm")]
#[case("USIMM")]
fn row_buffer_backend_accepts_both_spellings(#[case] name: &str) {
    let json = format!(
        r#"{{ "dram": {{ "backend": "{name}", "config_path": "a.cfg", "chip_path": "b.vi" }} }}"#
    );
    let config = Config::from_json_str(&json).unwrap();
    assert_eq!(config.dram.backend, DramBackendKind::Usimm);
    assert_eq!(config.dram.chip_path.unwrap().to_str(), Some("b.vi"));
}

#[rstest]
#[case(r#"{ "general": { "tiles": 0 } }"#, "general.tiles")]
#[case(r#"{ "general": { "lanes_per_tile": 0 } }"#, "lanes_per_tile")]
#[case(r#"{ "general": { "lanes_per_tile": 171 } }"#, "lanes_per_tile")]
#[case(r#"{ "staging": { "dispatch_width": 0 } }"#, "dispatch width")]
#[case(r#"{ "scheduler": { "return_queue_depth": 0 } }"#, "queue depths")]
#[case(r#"{ "scheduler": { "bucket_base": 4096 } }"#, "bucket_base")]
#[case(r#"{ "workload": { "segments": 0 } }"#, "workload.segments")]
#[case(r#"{ "dram": { "backend": "Usimm" } }"#, "dram.config_path")]
fn out_of_range_values_are_rejected(#[case] json: &str, #[case] field: &str) {
    match Config::from_json_str(json) {
        Err(ConfigError::Invalid(msg)) => assert!(msg.contains(field), "{msg}"),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[rstest]
#[case("{ \"general\": ")]
#[case(r#"{ "general": { "tiles": -1 } }"#)]
#[case(r#"{ "dram": { "backend": "Magic" } }"#)]
fn malformed_json_is_rejected(#[case] json: &str) {
    assert!(matches!(Config::from_json_str(json), Err(ConfigError::Json(_))));
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.json");
    fs::write(&path, r#"{ "general": { "tiles": 3 } }"#).unwrap();
    assert_eq!(Config::from_json_file(&path).unwrap().general.tiles, 3);

    let err = Config::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
}
