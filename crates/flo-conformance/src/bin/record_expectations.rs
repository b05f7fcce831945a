#![forbid(unsafe_code)]

use flo_conformance::catalog::Suite;
use flo_conformance::expectations::{record_expectations, write_expectations};
use flo_conformance::{HarnessConfig, parse_dim};
use flo_linalg::ScalarKind;
use std::path::PathBuf;

fn main() {
    if let Err(err) = run() {
        eprintln!("record_expectations failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut cfg = HarnessConfig::from_env()?;
    let mut output: Option<PathBuf> = None;
    let mut kinds: Vec<ScalarKind> = Vec::new();
    let mut suite: Option<Suite> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fixture-root" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--fixture-root requires a value".to_string())?;
                cfg.fixture_root = PathBuf::from(value);
            }
            "--dim" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--dim requires a value".to_string())?;
                cfg.dim = parse_dim(&value)?;
            }
            "--kind" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--kind requires a value".to_string())?;
                let kind = ScalarKind::from_tag(&value)
                    .ok_or_else(|| format!("unknown kind {value:?} (expected f32, f64, c32 or c64)"))?;
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            "--suite" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--suite requires a value".to_string())?;
                suite = Some(Suite::from_token(&value)?);
            }
            "--expectations" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--expectations requires a value".to_string())?;
                output = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p flo-conformance --bin record_expectations -- [--fixture-root <dir>] [--dim <n>] [--kind <f32|f64|c32|c64>]... [--suite <fixture|driver|func>] [--expectations <path>]"
                );
                return Ok(());
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }
    if kinds.is_empty() {
        kinds = ScalarKind::ALL.to_vec();
    }

    let output = output.unwrap_or_else(|| {
        let scope = suite.map_or("all", Suite::as_str);
        cfg.fixture_root
            .join("expectations")
            .join(format!("nalgebra_{scope}_{}.json", cfg.dim))
    });
    let table = record_expectations(&cfg, &kinds, suite)?;
    write_expectations(&output, &table)?;

    println!(
        "recorded {} cases (dim={}, seed={}) into {}",
        table.cases.len(),
        table.fixture_dim,
        table.fixture_seed,
        output.display()
    );
    Ok(())
}
