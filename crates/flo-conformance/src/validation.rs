use crate::catalog::{CaseId, CaseOutputs, CaseRunner, Suite};
use crate::expectations::{ExpectationCase, ExpectationTable};
use crate::fingerprint::{Scalar, Tolerance};
use crate::{
    HarnessConfig, SuiteReport, ValidationLogEntry, env_fingerprint, maybe_append_validation_log,
    now_unix_ms, sha256_hex,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;

pub const VALIDATION_REPORT_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub id: String,
    pub output: Option<String>,
    pub expected: Option<Scalar>,
    pub actual: Option<Scalar>,
    pub reason_code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema_version: u8,
    pub backend: String,
    pub fixture_dim: usize,
    pub generated_at_unix_ms: u128,
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    /// Set when strict mode stopped at the first failing case.
    pub aborted: bool,
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.aborted && self.failed_cases == 0 && self.passed_cases == self.total_cases
    }

    #[must_use]
    pub fn to_suite_report(&self, suite: &str) -> SuiteReport {
        SuiteReport {
            suite: suite.to_string(),
            case_count: self.total_cases,
            pass_count: self.passed_cases,
            failures: self
                .failures
                .iter()
                .map(|failure| format!("{}: {}", failure.id, failure.message))
                .collect(),
        }
    }
}

fn failure(id: &str, reason_code: &str, message: String) -> ValidationFailure {
    ValidationFailure {
        id: id.to_string(),
        output: None,
        expected: None,
        actual: None,
        reason_code: reason_code.to_string(),
        message,
    }
}

/// Compare every expected output of one case against what the backend
/// produced. Outputs the table does not name, and its reference-only
/// values, are ignored.
fn compare_outputs(
    id: &CaseId,
    expected: &ExpectationCase,
    actual: &CaseOutputs,
    tolerance: Tolerance,
) -> Vec<ValidationFailure> {
    let mismatch_code = if id.suite == Suite::Fixture {
        "fixture_fingerprint_mismatch"
    } else {
        "fingerprint_mismatch"
    };

    let mut failures = Vec::new();
    for (name, expected_value) in &expected.outputs {
        match actual.get(name) {
            None => failures.push(ValidationFailure {
                output: Some(name.clone()),
                expected: Some(*expected_value),
                ..failure(
                    &expected.id,
                    "output_missing",
                    format!("output {name} was not produced"),
                )
            }),
            Some(actual_value) if !expected_value.is_close(actual_value, tolerance) => {
                failures.push(ValidationFailure {
                    output: Some(name.clone()),
                    expected: Some(*expected_value),
                    actual: Some(*actual_value),
                    ..failure(
                        &expected.id,
                        mismatch_code,
                        format!(
                            "{name}: expected {expected_value}, got {actual_value} (rel_tol={}, abs_tol={})",
                            tolerance.rel_tol, tolerance.abs_tol
                        ),
                    )
                });
            }
            Some(_) => {}
        }
    }
    failures
}

struct CaseVerdict {
    fixture_id: String,
    input_digest: String,
    output_digest: String,
    failures: Vec<ValidationFailure>,
}

fn evaluate_case(
    runner: &mut CaseRunner,
    expected: &ExpectationCase,
    tolerance: Tolerance,
) -> Result<CaseVerdict, String> {
    let Some(id) = CaseId::parse(&expected.id) else {
        return Ok(CaseVerdict {
            fixture_id: "unresolved".to_string(),
            input_digest: sha256_hex(b""),
            output_digest: sha256_hex(b""),
            failures: vec![failure(
                &expected.id,
                "case_unknown",
                "id does not name a catalog case".to_string(),
            )],
        });
    };

    let run = runner.run(&id)?;
    let (output_digest, failures) = match &run.outputs {
        Ok(outputs) => {
            let rendered = serde_json::to_string(outputs)
                .map_err(|err| format!("failed serializing outputs of {id}: {err}"))?;
            (
                sha256_hex(rendered.as_bytes()),
                compare_outputs(&id, expected, outputs, tolerance),
            )
        }
        Err(err) => (
            sha256_hex(b""),
            vec![failure(
                &expected.id,
                "case_execution_failed",
                format!("{err} ({})", err.reason_code()),
            )],
        ),
    };
    Ok(CaseVerdict {
        fixture_id: run.fixture_id,
        input_digest: run.input_digest,
        output_digest,
        failures,
    })
}

/// Evaluate the table's cases (optionally one suite) against fixtures under
/// `config.fixture_root`, loaded at the table's fixture dimension.
///
/// `Err` is reserved for harness faults such as unreadable fixtures; case
/// level problems are reported as failures. In strict mode the first
/// failing case stops the run.
pub fn validate(
    config: &HarnessConfig,
    table: &ExpectationTable,
    suite: Option<Suite>,
) -> Result<ValidationReport, String> {
    table.validate()?;
    let tolerance = table.tolerance();
    let mode = if config.strict_mode { "strict" } else { "keep_going" };
    let mut runner = CaseRunner::new(&config.fixture_root, table.fixture_dim);

    let selected: Vec<&ExpectationCase> = table.selected(suite).collect();
    let mut passed_cases = 0usize;
    let mut failed_cases = 0usize;
    let mut aborted = false;
    let mut failures = Vec::new();

    for expected in &selected {
        let start = Instant::now();
        let verdict = evaluate_case(&mut runner, expected, tolerance)?;
        let passed = verdict.failures.is_empty();
        let reason_code = verdict
            .failures
            .first()
            .map_or_else(|| "none".to_string(), |first| first.reason_code.clone());

        maybe_append_validation_log(&ValidationLogEntry {
            ts_unix_ms: now_unix_ms(),
            suite_id: expected
                .id
                .split('.')
                .next()
                .unwrap_or_default()
                .to_string(),
            test_id: expected.id.clone(),
            fixture_id: verdict.fixture_id,
            mode: mode.to_string(),
            seed: u64::from(table.fixture_seed),
            input_digest: verdict.input_digest,
            output_digest: verdict.output_digest,
            env_fingerprint: env_fingerprint(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome: if passed { "pass" } else { "fail" }.to_string(),
            reason_code,
        })?;

        if passed {
            passed_cases += 1;
            continue;
        }
        failed_cases += 1;
        failures.extend(verdict.failures);
        if config.strict_mode {
            aborted = failed_cases + passed_cases < selected.len();
            break;
        }
    }

    Ok(ValidationReport {
        schema_version: VALIDATION_REPORT_SCHEMA_VERSION,
        backend: table.backend.clone(),
        fixture_dim: table.fixture_dim,
        generated_at_unix_ms: now_unix_ms(),
        rel_tol: tolerance.rel_tol,
        abs_tol: tolerance.abs_tol,
        total_cases: selected.len(),
        passed_cases,
        failed_cases,
        aborted,
        failures,
    })
}

pub fn write_validation_report(path: &Path, report: &ValidationReport) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(report)
        .map_err(|err| format!("failed serializing validation report: {err}"))?;
    fs::write(path, payload.as_bytes())
        .map_err(|err| format!("failed writing {}: {err}", path.display()))
}
