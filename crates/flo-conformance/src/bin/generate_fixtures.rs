#![forbid(unsafe_code)]

use flo_conformance::fixtures::{FixtureSpec, generate_fixtures};
use flo_conformance::{HarnessConfig, parse_dim};
use std::path::PathBuf;

fn main() {
    if let Err(err) = run() {
        eprintln!("generate_fixtures failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut cfg = HarnessConfig::from_env()?;
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
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--seed requires a value".to_string())?;
                cfg.seed = value
                    .parse::<u32>()
                    .map_err(|err| format!("invalid --seed {value:?}: {err}"))?;
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p flo-conformance --bin generate_fixtures -- [--fixture-root <dir>] [--dim <n>] [--seed <u32>]"
                );
                return Ok(());
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }

    let manifest = generate_fixtures(
        &cfg.fixture_root,
        FixtureSpec {
            seed: cfg.seed,
            dim: cfg.dim,
        },
    )?;
    let manifest_json = serde_json::to_string_pretty(&manifest)
        .map_err(|err| format!("failed serializing manifest: {err}"))?;
    println!("{manifest_json}");
    eprintln!("wrote {} fixtures to {}", manifest.entries.len(), cfg.fixture_root.display());
    Ok(())
}
