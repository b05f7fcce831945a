use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use flo_conformance::catalog::Suite;
use flo_conformance::expectations::{
    ExpectationCase, ExpectationTable, discover_expectation_tables, load_expectations,
    record_expectations, write_expectations,
};
use flo_conformance::fingerprint::Scalar;
use flo_conformance::fixtures::{FixtureSpec, generate_fixtures};
use flo_conformance::validation::validate;
use flo_conformance::{HarnessConfig, ValidationLogEntry, set_validation_log_path};
use flo_linalg::ScalarKind;

const SMOKE_DIM: usize = 8;

fn workspace(name: &str) -> PathBuf {
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    std::env::temp_dir().join(format!(
        "flo_smoke_{name}_{}_{ts_nanos}",
        std::process::id()
    ))
}

fn recorded(name: &str, kinds: &[ScalarKind]) -> (PathBuf, HarnessConfig, ExpectationTable) {
    let root = workspace(name);
    let fixture_root = root.join("fixtures");
    generate_fixtures(
        &fixture_root,
        FixtureSpec {
            seed: 42,
            dim: SMOKE_DIM,
        },
    )
    .expect("fixtures should generate");

    let mut cfg = HarnessConfig::default_paths();
    cfg.fixture_root = fixture_root;
    cfg.dim = SMOKE_DIM;
    let table = record_expectations(&cfg, kinds, None).expect("catalog should record");
    (root, cfg, table)
}

fn output_of<'a>(table: &'a mut ExpectationTable, id: &str) -> &'a mut ExpectationCase {
    table
        .cases
        .iter_mut()
        .find(|case| case.id == id)
        .unwrap_or_else(|| panic!("table should contain {id}"))
}

#[test]
fn generate_record_validate_round_trip_passes() {
    let (root, cfg, table) = recorded("round_trip", &ScalarKind::ALL);
    assert_eq!(table.cases.len(), 2 * 36 + 2 * 38);

    let path = root.join("expectations.json");
    write_expectations(&path, &table).expect("table should write");
    let loaded = load_expectations(&path).expect("table should load");

    let log_path = root.join("validation.jsonl");
    set_validation_log_path(Some(log_path.clone()));
    let report = validate(&cfg, &loaded, None).expect("validation should run");
    set_validation_log_path(None);
    assert!(report.all_passed(), "failures={:?}", report.failures);
    assert_eq!(report.total_cases, table.cases.len());

    let raw = fs::read_to_string(&log_path).expect("validation log should exist");
    let entries: Vec<ValidationLogEntry> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("log line must parse"))
        .collect();
    assert!(entries.len() >= table.cases.len());
    for entry in &entries {
        assert!(entry.is_replay_complete(), "incomplete log entry {entry:?}");
    }
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn tampered_expectation_fails_with_fingerprint_mismatch() {
    let (root, mut cfg, mut table) = recorded("tampered", &[ScalarKind::F64]);
    if let Some(Scalar::Real(value)) = output_of(&mut table, "func.f64.inv").outputs.get_mut("inv") {
        *value += 1.0;
    } else {
        panic!("inv output should be real");
    }

    cfg.strict_mode = false;
    let report = validate(&cfg, &table, None).expect("validation should run");
    assert_eq!(report.failed_cases, 1);
    assert_eq!(report.passed_cases, report.total_cases - 1);
    assert_eq!(report.failures[0].id, "func.f64.inv");
    assert_eq!(report.failures[0].reason_code, "fingerprint_mismatch");
    assert!(!report.all_passed());

    let driver_only = validate(&cfg, &table, Some(Suite::Driver)).expect("driver suite");
    assert!(driver_only.all_passed());
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn strict_mode_aborts_at_first_failure() {
    let (root, cfg, mut table) = recorded("strict", &[ScalarKind::C64]);
    assert!(cfg.strict_mode);
    output_of(&mut table, "fixture.c64.a")
        .outputs
        .insert("fingerprint".to_string(), Scalar::Complex([0.0, 0.0]));

    let report = validate(&cfg, &table, None).expect("validation should run");
    assert!(report.aborted);
    assert_eq!(report.failed_cases, 1);
    assert_eq!(report.passed_cases, 0);
    assert_eq!(report.failures[0].reason_code, "fixture_fingerprint_mismatch");
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unknown_cases_and_missing_outputs_are_reported() {
    let (root, mut cfg, mut table) = recorded("unknown", &[ScalarKind::F32]);
    output_of(&mut table, "driver.f32.getri")
        .outputs
        .insert("lu".to_string(), Scalar::Real(1.0));
    table.cases.push(ExpectationCase {
        id: "driver.f32.geqrf".to_string(),
        outputs: [("r".to_string(), Scalar::Real(0.0))].into_iter().collect(),
        reference_only: Default::default(),
    });

    cfg.strict_mode = false;
    let report = validate(&cfg, &table, None).expect("validation should run");
    let codes: Vec<(&str, &str)> = report
        .failures
        .iter()
        .map(|failure| (failure.id.as_str(), failure.reason_code.as_str()))
        .collect();
    assert_eq!(
        codes,
        [
            ("driver.f32.getri", "output_missing"),
            ("driver.f32.geqrf", "case_unknown"),
        ]
    );
    assert_eq!(report.failed_cases, 2);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn missing_fixtures_are_a_harness_error() {
    let (root, mut cfg, table) = recorded("missing", &[ScalarKind::F64]);
    cfg.fixture_root = root.join("nowhere");
    let err = validate(&cfg, &table, None).expect_err("fixtures are gone");
    assert!(err.contains("failed reading"), "{err}");
    let _ = fs::remove_dir_all(&root);
}

/// Full-size run of the shipped reference tables against freshly generated
/// fixtures. Takes minutes in debug builds.
#[test]
#[ignore = "generates 1024x1024 fixtures and runs every reference case"]
fn shipped_reference_tables_pass_at_dim_1024() {
    let root = workspace("reference_1024");
    let mut cfg = HarnessConfig::default_paths();
    cfg.fixture_root = root.join("fixtures");
    cfg.strict_mode = false;
    generate_fixtures(
        &cfg.fixture_root,
        FixtureSpec {
            seed: cfg.seed,
            dim: cfg.dim,
        },
    )
    .expect("fixtures should generate");

    let tables = discover_expectation_tables(&cfg.expectation_root).expect("discover");
    assert_eq!(tables.len(), 3);
    for path in tables {
        let table = load_expectations(&path).expect("shipped table loads");
        let report = validate(&cfg, &table, None).expect("validation should run");
        assert!(
            report.all_passed(),
            "{}: failures={:?}",
            path.display(),
            report.failures
        );
    }
    let _ = fs::remove_dir_all(&root);
}
