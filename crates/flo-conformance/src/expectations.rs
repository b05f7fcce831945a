use crate::catalog::{CaseId, CaseOutputs, CaseRunner, Suite, case_ids};
use crate::fingerprint::{Scalar, Tolerance};
use crate::{HarnessConfig, validate_dim};
use flo_linalg::ScalarKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXPECTATION_SCHEMA_VERSION: u8 = 1;
pub const RECORDING_BACKEND: &str = "nalgebra";
/// Subdirectory of the expectation root holding reference tables whose
/// cases read the `b` fixture. Their constants only hold against the `b`
/// files they were recorded from, which the seeded generator does not
/// reproduce, so table discovery at the root skips them.
pub const B_DEPENDENT_TABLE_DIR: &str = "b_dependent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationCase {
    pub id: String,
    pub outputs: BTreeMap<String, Scalar>,
    /// Values the reference backend produced that this backend cannot
    /// reproduce by construction. Carried for provenance, never compared.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reference_only: BTreeMap<String, Scalar>,
}

/// Expected fingerprints for a set of catalog cases, produced once by a
/// trusted backend at a fixed fixture dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationTable {
    pub schema_version: u8,
    pub backend: String,
    pub fixture_dim: usize,
    pub fixture_seed: u32,
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub cases: Vec<ExpectationCase>,
}

impl ExpectationTable {
    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            rel_tol: self.rel_tol,
            abs_tol: self.abs_tol,
        }
    }

    /// Structural checks only; case ids are resolved at validation time so
    /// an unknown id is reported per case instead of rejecting the table.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != EXPECTATION_SCHEMA_VERSION {
            return Err(format!(
                "unsupported expectation schema_version {} (expected {EXPECTATION_SCHEMA_VERSION})",
                self.schema_version
            ));
        }
        if self.backend.trim().is_empty() {
            return Err("expectation backend must not be empty".to_string());
        }
        validate_dim(self.fixture_dim)?;
        if !(self.rel_tol.is_finite() && self.abs_tol.is_finite())
            || self.rel_tol < 0.0
            || self.abs_tol < 0.0
        {
            return Err("expectation tolerances must be finite and non-negative".to_string());
        }

        let mut seen = BTreeSet::new();
        for case in &self.cases {
            if case.id.trim().is_empty() {
                return Err("expectation case id must not be empty".to_string());
            }
            if !seen.insert(case.id.as_str()) {
                return Err(format!("duplicate expectation case id {}", case.id));
            }
            if case.outputs.is_empty() {
                return Err(format!("expectation case {} lists no outputs", case.id));
            }
            if let Some((name, _)) = case
                .outputs
                .iter()
                .chain(&case.reference_only)
                .find(|(_, value)| !value.is_finite())
            {
                return Err(format!("expectation {}:{name} is not finite", case.id));
            }
            if let Some(name) = case
                .reference_only
                .keys()
                .find(|name| case.outputs.contains_key(*name))
            {
                return Err(format!(
                    "expectation {}:{name} is both compared and reference-only",
                    case.id
                ));
            }
        }
        Ok(())
    }

    /// Cases whose id prefix names `suite`; everything when `suite` is `None`.
    pub fn selected(&self, suite: Option<Suite>) -> impl Iterator<Item = &ExpectationCase> {
        self.cases.iter().filter(move |case| {
            suite.is_none_or(|wanted| case.id.split('.').next() == Some(wanted.as_str()))
        })
    }
}

/// Run every catalog case for `kinds` against the fixtures under
/// `config.fixture_root` and capture the fingerprints as a table.
pub fn record_expectations(
    config: &HarnessConfig,
    kinds: &[ScalarKind],
    suite: Option<Suite>,
) -> Result<ExpectationTable, String> {
    config.validate()?;
    let mut runner = CaseRunner::new(&config.fixture_root, config.dim);
    let mut cases = Vec::new();
    for &kind in kinds {
        for id in case_ids(kind, suite) {
            let outputs = record_case(&mut runner, &id)?;
            cases.push(ExpectationCase {
                id: id.to_string(),
                outputs,
                reference_only: BTreeMap::new(),
            });
        }
    }

    Ok(ExpectationTable {
        schema_version: EXPECTATION_SCHEMA_VERSION,
        backend: RECORDING_BACKEND.to_string(),
        fixture_dim: config.dim,
        fixture_seed: config.seed,
        rel_tol: config.rel_tol,
        abs_tol: config.abs_tol,
        cases,
    })
}

fn record_case(runner: &mut CaseRunner, id: &CaseId) -> Result<CaseOutputs, String> {
    let outputs = runner.run(id)?.outputs.map_err(|err| {
        format!(
            "case {id} failed while recording ({}): {err}",
            err.reason_code()
        )
    })?;
    // serde_json writes NaN and infinities as null.
    if let Some((name, value)) = outputs.iter().find(|(_, value)| !value.is_finite()) {
        return Err(format!("case {id} produced non-finite {name} = {value}"));
    }
    Ok(outputs)
}

pub fn load_expectations(path: &Path) -> Result<ExpectationTable, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    let table: ExpectationTable = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid expectation table {}: {err}", path.display()))?;
    table
        .validate()
        .map_err(|err| format!("invalid expectation table {}: {err}", path.display()))?;
    Ok(table)
}

pub fn write_expectations(path: &Path, table: &ExpectationTable) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }
    let payload = serde_json::to_string_pretty(table)
        .map_err(|err| format!("failed serializing expectation table: {err}"))?;
    fs::write(path, format!("{payload}\n"))
        .map_err(|err| format!("failed writing {}: {err}", path.display()))
}

/// Every `*.json` table directly under `root`, sorted by file name.
pub fn discover_expectation_tables(root: &Path) -> Result<Vec<PathBuf>, String> {
    let entries =
        fs::read_dir(root).map_err(|err| format!("failed reading {}: {err}", root.display()))?;
    let mut tables = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| format!("failed reading {}: {err}", root.display()))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            tables.push(path);
        }
    }
    tables.sort();
    Ok(tables)
}
