#![forbid(unsafe_code)]

pub mod catalog;
pub mod expectations;
pub mod fingerprint;
pub mod fixtures;
pub mod validation;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_FIXTURE_DIM: usize = 1024;
pub const DEFAULT_REL_TOL: f64 = 1e-5;
pub const DEFAULT_ABS_TOL: f64 = 1e-8;
pub const MIN_FIXTURE_DIM: usize = 6;

pub const VALIDATION_REASON_CODES: [&str; 5] = [
    "fingerprint_mismatch",
    "output_missing",
    "case_unknown",
    "case_execution_failed",
    "fixture_fingerprint_mismatch",
];

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub expectation_root: PathBuf,
    /// Validation logs and reports land here unless a binary is told otherwise.
    pub artifact_root: PathBuf,
    pub dim: usize,
    pub seed: u32,
    pub strict_mode: bool,
    pub rel_tol: f64,
    pub abs_tol: f64,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Self {
            fixture_root: crate_root.join("fixtures/generated"),
            expectation_root: crate_root.join("fixtures/reference"),
            artifact_root: crate_root.join("../../target/flo-conformance"),
            dim: DEFAULT_FIXTURE_DIM,
            seed: flo_random::DEFAULT_FIXTURE_SEED,
            strict_mode: true,
            rel_tol: DEFAULT_REL_TOL,
            abs_tol: DEFAULT_ABS_TOL,
        }
    }

    /// Defaults overridden by `FLO_FIXTURE_ROOT`, `FLO_FIXTURE_DIM` and
    /// `FLO_STRICT`.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default_paths();
        if let Some(root) = std::env::var_os("FLO_FIXTURE_ROOT") {
            config.fixture_root = PathBuf::from(root);
        }
        if let Ok(raw) = std::env::var("FLO_FIXTURE_DIM") {
            config.dim = parse_dim(&raw)?;
        }
        if let Ok(raw) = std::env::var("FLO_STRICT") {
            config.strict_mode = parse_flag(&raw)
                .ok_or_else(|| format!("FLO_STRICT must be a boolean flag, got {raw:?}"))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_dim(self.dim)?;
        if !self.rel_tol.is_finite() || !self.abs_tol.is_finite() {
            return Err("tolerances must be finite".to_string());
        }
        if self.rel_tol < 0.0 || self.abs_tol < 0.0 {
            return Err("tolerances must be non-negative".to_string());
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

pub fn parse_dim(raw: &str) -> Result<usize, String> {
    let dim = raw
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid fixture dimension {raw:?}: {err}"))?;
    validate_dim(dim)?;
    Ok(dim)
}

/// Cases reshape `dim × dim/2` blocks and a 5×5 determinant block.
pub fn validate_dim(dim: usize) -> Result<(), String> {
    if dim < MIN_FIXTURE_DIM || dim % 2 != 0 {
        return Err(format!(
            "fixture dimension must be even and at least {MIN_FIXTURE_DIM}, got {dim}"
        ));
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    pub suite: String,
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLogEntry {
    pub ts_unix_ms: u128,
    pub suite_id: String,
    pub test_id: String,
    pub fixture_id: String,
    pub mode: String,
    pub seed: u64,
    pub input_digest: String,
    pub output_digest: String,
    pub env_fingerprint: String,
    pub duration_ms: u64,
    pub outcome: String,
    pub reason_code: String,
}

impl ValidationLogEntry {
    /// A record carries enough context to replay the case: identifiers,
    /// digests, a known outcome, and a reason code consistent with it.
    #[must_use]
    pub fn is_replay_complete(&self) -> bool {
        if self.suite_id.trim().is_empty()
            || self.test_id.trim().is_empty()
            || self.fixture_id.trim().is_empty()
            || self.mode.trim().is_empty()
            || self.input_digest.trim().is_empty()
            || self.output_digest.trim().is_empty()
            || self.env_fingerprint.trim().is_empty()
            || self.reason_code.trim().is_empty()
        {
            return false;
        }

        match self.outcome.as_str() {
            "pass" => self.reason_code == "none",
            "fail" => VALIDATION_REASON_CODES
                .iter()
                .any(|code| *code == self.reason_code),
            _ => false,
        }
    }
}

static VALIDATION_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_validation_log_path(path: Option<PathBuf>) {
    let cell = VALIDATION_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

pub(crate) fn maybe_append_validation_log(entry: &ValidationLogEntry) -> Result<(), String> {
    let configured = VALIDATION_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os("FLO_VALIDATION_LOG_PATH").map(PathBuf::from);
    let Some(path) = configured.or(from_env) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| format!("failed serializing validation log entry: {err}"))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload)
        .map_err(|err| format!("failed appending validation log {}: {err}", path.display()))
}

pub(crate) fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

pub(crate) fn env_fingerprint() -> String {
    format!(
        "{}-{}-nalgebra",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
