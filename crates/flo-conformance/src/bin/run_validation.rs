#![forbid(unsafe_code)]

use flo_conformance::catalog::Suite;
use flo_conformance::expectations::{
    B_DEPENDENT_TABLE_DIR, discover_expectation_tables, load_expectations,
};
use flo_conformance::validation::{validate, write_validation_report};
use flo_conformance::{HarnessConfig, SuiteReport, set_validation_log_path};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
struct SuiteSummary {
    suite: String,
    case_count: usize,
    pass_count: usize,
    failures: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ValidationSummary {
    status: &'static str,
    validation_log: String,
    report_dir: String,
    suites: Vec<SuiteSummary>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("run_validation failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut cfg = HarnessConfig::from_env()?;
    let mut tables: Vec<PathBuf> = Vec::new();
    let mut log_path: Option<PathBuf> = None;
    let mut report_dir: Option<PathBuf> = None;
    let mut suite: Option<Suite> = None;
    let mut include_b_dependent = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fixture-root" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--fixture-root requires a value".to_string())?;
                cfg.fixture_root = PathBuf::from(value);
            }
            "--expectations" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--expectations requires a value".to_string())?;
                tables.push(PathBuf::from(value));
            }
            "--log-path" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--log-path requires a value".to_string())?;
                log_path = Some(PathBuf::from(value));
            }
            "--report-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--report-dir requires a value".to_string())?;
                report_dir = Some(PathBuf::from(value));
            }
            "--suite" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--suite requires a value".to_string())?;
                suite = Some(Suite::from_token(&value)?);
            }
            "--keep-going" => cfg.strict_mode = false,
            "--include-b-dependent" => include_b_dependent = true,
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p flo-conformance --bin run_validation -- [--fixture-root <dir>] [--expectations <path>]... [--log-path <path>] [--report-dir <dir>] [--suite <fixture|driver|func>] [--keep-going] [--include-b-dependent]"
                );
                return Ok(());
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }
    if tables.is_empty() {
        tables = discover_expectation_tables(&cfg.expectation_root)?;
        if include_b_dependent {
            tables.extend(discover_expectation_tables(
                &cfg.expectation_root.join(B_DEPENDENT_TABLE_DIR),
            )?);
        }
    }
    if tables.is_empty() {
        return Err(format!(
            "no expectation tables found under {}",
            cfg.expectation_root.display()
        ));
    }

    let artifacts = cfg.artifact_root.clone();
    let ts_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    let log_path = log_path.unwrap_or_else(|| {
        artifacts
            .join("logs")
            .join(format!("validation_{ts_millis}.jsonl"))
    });
    let report_dir = report_dir.unwrap_or_else(|| artifacts.join("reports"));
    set_validation_log_path(Some(log_path.clone()));

    let mut suites = Vec::with_capacity(tables.len());
    let mut all_passed = true;
    for path in &tables {
        let table = load_expectations(path)?;
        let report = validate(&cfg, &table, suite)?;
        // b_dependent/lapack_func_f64.json -> b_dependent_lapack_func_f64
        let label = path
            .strip_prefix(&cfg.expectation_root)
            .unwrap_or(path)
            .with_extension("")
            .to_string_lossy()
            .replace(['/', '\\'], "_");
        write_validation_report(
            &report_dir.join(format!("{label}_validation_report.json")),
            &report,
        )?;
        all_passed &= report.all_passed();
        suites.push(summarize_suite(report.to_suite_report(&label)));
        if !all_passed && cfg.strict_mode {
            break;
        }
    }

    let status = if all_passed { "pass" } else { "fail" };
    let summary = ValidationSummary {
        status,
        validation_log: log_path.display().to_string(),
        report_dir: report_dir.display().to_string(),
        suites,
    };
    let summary_json = serde_json::to_string_pretty(&summary)
        .map_err(|err| format!("failed serializing summary: {err}"))?;
    println!("{summary_json}");

    if status == "fail" {
        std::process::exit(2);
    }
    Ok(())
}

fn summarize_suite(report: SuiteReport) -> SuiteSummary {
    SuiteSummary {
        suite: report.suite,
        case_count: report.case_count,
        pass_count: report.pass_count,
        failures: report.failures,
    }
}
