//! Fixed catalog of linear-algebra cases and their fingerprinted outputs.
//!
//! Case ids read `<suite>.<kind>.<case>`, e.g. `driver.f64.syevd.lower` or
//! `func.c64.svd.thin_tall`. With `n = dim` every case reshapes leading
//! fixture elements: square `n × n`, right-hand sides `n × n/2` from `b`,
//! tall `n × n/2` and wide `n/2 × n` from `a`.

use crate::fingerprint::{
    Scalar, fingerprint, fingerprint_abs, fingerprint_f64, fingerprint_indices,
    fingerprint_matrix,
};
use crate::fixtures::{FixtureRole, FixtureSet};
use flo_linalg::{
    DenseMatrix, EighItype, EighOutput, LinAlgError, OracleScalar, ScalarKind, SvdMode,
    SymmetryKind, UpLo,
};
use num_complex::Complex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DET_BLOCK_ORDER: usize = 5;
pub const PINV_ATOL: f64 = 20.0;
pub const PINV_RTOL: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suite {
    Fixture,
    Driver,
    Func,
}

impl Suite {
    pub const ALL: [Self; 3] = [Self::Fixture, Self::Driver, Self::Func];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixture => "fixture",
            Self::Driver => "driver",
            Self::Func => "func",
        }
    }

    pub fn from_token(token: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.as_str() == token.trim())
            .ok_or_else(|| format!("unknown suite {token:?} (expected fixture, driver or func)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `n × n/2`
    Tall,
    /// `n/2 × n`
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Fixture(FixtureRole),
    Syevd(UpLo),
    Sygvd(UpLo, EighItype),
    Gesv,
    Getrf,
    Getri,
    Potrf(UpLo),
    Sysv(UpLo),
    Cholesky(UpLo),
    Eigh(UpLo),
    EighGeneralized(UpLo, EighItype),
    Inv,
    SolveGeneralMatrix,
    SolveGeneralVector,
    SolveSymmetric(UpLo, SymmetryKind),
    SolveTriangular(UpLo),
    Slogdet,
    Det,
    Svd(SvdMode, Orientation),
    Pinv(Orientation),
}

impl Case {
    /// Hermitian solves only exist for complex fixtures.
    #[must_use]
    pub fn supports(self, kind: ScalarKind) -> bool {
        match self {
            Self::SolveSymmetric(_, SymmetryKind::Hermitian) => kind.is_complex(),
            _ => true,
        }
    }
}

const CATALOG: [(Suite, &str, Case); 38] = [
    (Suite::Fixture, "a", Case::Fixture(FixtureRole::A)),
    (Suite::Fixture, "b", Case::Fixture(FixtureRole::B)),
    (Suite::Driver, "syevd.lower", Case::Syevd(UpLo::Lower)),
    (Suite::Driver, "syevd.upper", Case::Syevd(UpLo::Upper)),
    (Suite::Driver, "sygvd.lower_itype1", Case::Sygvd(UpLo::Lower, EighItype::AxLBx)),
    (Suite::Driver, "sygvd.upper_itype1", Case::Sygvd(UpLo::Upper, EighItype::AxLBx)),
    (Suite::Driver, "sygvd.lower_itype2", Case::Sygvd(UpLo::Lower, EighItype::ABxLx)),
    (Suite::Driver, "sygvd.lower_itype3", Case::Sygvd(UpLo::Lower, EighItype::BAxLx)),
    (Suite::Driver, "gesv", Case::Gesv),
    (Suite::Driver, "getrf", Case::Getrf),
    (Suite::Driver, "getri", Case::Getri),
    (Suite::Driver, "potrf.lower", Case::Potrf(UpLo::Lower)),
    (Suite::Driver, "potrf.upper", Case::Potrf(UpLo::Upper)),
    (Suite::Driver, "sysv.lower", Case::Sysv(UpLo::Lower)),
    (Suite::Driver, "sysv.upper", Case::Sysv(UpLo::Upper)),
    (Suite::Func, "cholesky.lower", Case::Cholesky(UpLo::Lower)),
    (Suite::Func, "cholesky.upper", Case::Cholesky(UpLo::Upper)),
    (Suite::Func, "eigh.lower", Case::Eigh(UpLo::Lower)),
    (Suite::Func, "eigh.upper", Case::Eigh(UpLo::Upper)),
    (
        Suite::Func,
        "eigh_generalized.lower_itype1",
        Case::EighGeneralized(UpLo::Lower, EighItype::AxLBx),
    ),
    (
        Suite::Func,
        "eigh_generalized.upper_itype3",
        Case::EighGeneralized(UpLo::Upper, EighItype::BAxLx),
    ),
    (Suite::Func, "inv", Case::Inv),
    (Suite::Func, "solve_general.matrix", Case::SolveGeneralMatrix),
    (Suite::Func, "solve_general.vector", Case::SolveGeneralVector),
    (
        Suite::Func,
        "solve_symmetric.sym_lower",
        Case::SolveSymmetric(UpLo::Lower, SymmetryKind::Symmetric),
    ),
    (
        Suite::Func,
        "solve_symmetric.sym_upper",
        Case::SolveSymmetric(UpLo::Upper, SymmetryKind::Symmetric),
    ),
    (
        Suite::Func,
        "solve_symmetric.her_lower",
        Case::SolveSymmetric(UpLo::Lower, SymmetryKind::Hermitian),
    ),
    (
        Suite::Func,
        "solve_symmetric.her_upper",
        Case::SolveSymmetric(UpLo::Upper, SymmetryKind::Hermitian),
    ),
    (Suite::Func, "solve_triangular.lower", Case::SolveTriangular(UpLo::Lower)),
    (Suite::Func, "solve_triangular.upper", Case::SolveTriangular(UpLo::Upper)),
    (Suite::Func, "slogdet", Case::Slogdet),
    (Suite::Func, "det", Case::Det),
    (Suite::Func, "svd.full_tall", Case::Svd(SvdMode::Full, Orientation::Tall)),
    (Suite::Func, "svd.thin_tall", Case::Svd(SvdMode::Thin, Orientation::Tall)),
    (Suite::Func, "svd.values_tall", Case::Svd(SvdMode::ValuesOnly, Orientation::Tall)),
    (Suite::Func, "svd.thin_wide", Case::Svd(SvdMode::Thin, Orientation::Wide)),
    (Suite::Func, "pinv.tall", Case::Pinv(Orientation::Tall)),
    (Suite::Func, "pinv.wide", Case::Pinv(Orientation::Wide)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseId {
    pub suite: Suite,
    pub kind: ScalarKind,
    pub name: &'static str,
    pub case: Case,
}

impl CaseId {
    /// Resolve an id against the catalog; `None` for anything it does not
    /// list, including Hermitian cases on real kinds.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.trim().splitn(3, '.');
        let suite = Suite::from_token(parts.next()?).ok()?;
        let kind = ScalarKind::from_tag(parts.next()?)?;
        let rest = parts.next()?;
        CATALOG
            .into_iter()
            .find(|(entry_suite, name, _)| *entry_suite == suite && *name == rest)
            .filter(|(_, _, case)| case.supports(kind))
            .map(|(_, name, case)| Self {
                suite,
                kind,
                name,
                case,
            })
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.suite.as_str(), self.kind.tag(), self.name)
    }
}

/// Every catalog case for `kind`, optionally restricted to one suite.
#[must_use]
pub fn case_ids(kind: ScalarKind, suite: Option<Suite>) -> Vec<CaseId> {
    CATALOG
        .into_iter()
        .filter(|(entry_suite, _, case)| {
            suite.is_none_or(|wanted| wanted == *entry_suite) && case.supports(kind)
        })
        .map(|(entry_suite, name, case)| CaseId {
            suite: entry_suite,
            kind,
            name,
            case,
        })
        .collect()
}

pub type CaseOutputs = BTreeMap<String, Scalar>;

/// Result of running one case against loaded fixtures.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRun {
    pub fixture_id: String,
    pub input_digest: String,
    pub outputs: Result<CaseOutputs, LinAlgError>,
}

fn eig_outputs<T: OracleScalar>(result: &EighOutput<T>) -> Vec<(&'static str, Scalar)> {
    vec![("w", fingerprint_f64(&result.w)), ("abs_v", fingerprint_abs(&result.v))]
}

fn oriented<T: OracleScalar>(
    values: &[T],
    n: usize,
    orientation: Orientation,
) -> Result<DenseMatrix<T>, LinAlgError> {
    match orientation {
        Orientation::Tall => DenseMatrix::from_leading(values, n, n / 2),
        Orientation::Wide => DenseMatrix::from_leading(values, n / 2, n),
    }
}

fn execute<T: OracleScalar>(
    case: Case,
    set: &FixtureSet<T>,
) -> Result<Vec<(&'static str, Scalar)>, LinAlgError> {
    let n = set.dim;
    let square_a = || DenseMatrix::from_leading(&set.a, n, n);
    let square_b = || DenseMatrix::from_leading(&set.b, n, n);
    let rhs = || DenseMatrix::from_leading(&set.b, n, n / 2);

    let outputs = match case {
        Case::Fixture(role) => vec![("fingerprint", fingerprint(set.role(role)))],
        Case::Syevd(uplo) => eig_outputs(&flo_linalg::syevd(&square_a()?, uplo)?),
        Case::Sygvd(uplo, itype) => {
            eig_outputs(&flo_linalg::sygvd(&square_a()?, &square_b()?, uplo, itype)?)
        }
        Case::Gesv => {
            let solved = flo_linalg::gesv(&square_a()?, &rhs()?)?;
            vec![
                ("lu", fingerprint_matrix(&solved.lu)),
                ("ipiv", fingerprint_indices(&solved.ipiv)),
                ("x", fingerprint_matrix(&solved.x)),
            ]
        }
        Case::Getrf => {
            let factored = flo_linalg::getrf(&square_a()?)?;
            vec![
                ("lu", fingerprint_matrix(&factored.lu)),
                ("ipiv", fingerprint_indices(&factored.ipiv)),
            ]
        }
        Case::Getri => {
            let factored = flo_linalg::getrf(&square_a()?)?;
            let inverse = flo_linalg::getri(&factored.lu, &factored.ipiv)?;
            vec![("inv", fingerprint_matrix(&inverse))]
        }
        Case::Potrf(uplo) => vec![("c", fingerprint_matrix(&flo_linalg::potrf(&square_b()?, uplo)?))],
        Case::Sysv(uplo) => {
            let x = flo_linalg::sysv(&square_a()?, &rhs()?, uplo, SymmetryKind::Symmetric)?;
            vec![("x", fingerprint_matrix(&x))]
        }
        Case::Cholesky(uplo) => {
            vec![("c", fingerprint_matrix(&flo_linalg::cholesky(&square_b()?, uplo)?))]
        }
        Case::Eigh(uplo) => eig_outputs(&flo_linalg::eigh(&square_a()?, uplo)?),
        Case::EighGeneralized(uplo, itype) => eig_outputs(&flo_linalg::eigh_generalized(
            &square_a()?,
            &square_b()?,
            uplo,
            itype,
        )?),
        Case::Inv => vec![("inv", fingerprint_matrix(&flo_linalg::inv(&square_a()?)?))],
        Case::SolveGeneralMatrix => {
            vec![("x", fingerprint_matrix(&flo_linalg::solve_general(&square_a()?, &rhs()?)?))]
        }
        Case::SolveGeneralVector => {
            let vector = DenseMatrix::column(set.b[..n].to_vec())?;
            vec![("x", fingerprint_matrix(&flo_linalg::solve_general(&square_a()?, &vector)?))]
        }
        Case::SolveSymmetric(uplo, kind) => {
            let x = flo_linalg::solve_symmetric(&square_a()?, &rhs()?, uplo, kind)?;
            vec![("x", fingerprint_matrix(&x))]
        }
        Case::SolveTriangular(uplo) => {
            // Triangle of `b` as coefficients, tall block of `a` as rhs.
            let x = flo_linalg::solve_triangular(
                &square_b()?,
                &oriented(&set.a, n, Orientation::Tall)?,
                uplo,
            )?;
            vec![("x", fingerprint_matrix(&x))]
        }
        Case::Slogdet => {
            let (sign, logabsdet) = flo_linalg::slogdet(&square_a()?)?;
            vec![("sign", Scalar::of(sign)), ("logabsdet", Scalar::Real(logabsdet))]
        }
        Case::Det => {
            let block = DenseMatrix::from_leading(&set.a, DET_BLOCK_ORDER, DET_BLOCK_ORDER)?;
            vec![("det", Scalar::of(flo_linalg::det(&block)?))]
        }
        Case::Svd(mode, orientation) => {
            let decomposed = flo_linalg::svd(&oriented(&set.a, n, orientation)?, mode)?;
            let mut outputs = Vec::with_capacity(3);
            if let Some(u) = &decomposed.u {
                outputs.push(("abs_u", fingerprint_abs(u)));
            }
            outputs.push(("s", fingerprint_f64(&decomposed.s)));
            if let Some(vt) = &decomposed.vt {
                outputs.push(("abs_vt", fingerprint_abs(vt)));
            }
            outputs
        }
        Case::Pinv(orientation) => {
            let (inverse, rank) =
                flo_linalg::pinv(&oriented(&set.a, n, orientation)?, PINV_ATOL, PINV_RTOL)?;
            vec![
                ("pinv", fingerprint_matrix(&inverse)),
                ("rank", Scalar::Count(rank as u64)),
            ]
        }
    };
    Ok(outputs)
}

/// Run `case` against an already loaded fixture set of the matching kind.
pub fn run_case<T: OracleScalar>(case: Case, set: &FixtureSet<T>) -> CaseRun {
    CaseRun {
        fixture_id: set.fixture_id(),
        input_digest: set.input_digest.clone(),
        outputs: execute(case, set).map(|outputs| {
            outputs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect()
        }),
    }
}

fn load_once<'a, T: OracleScalar>(
    slot: &'a mut Option<FixtureSet<T>>,
    root: &Path,
    dim: usize,
) -> Result<&'a FixtureSet<T>, String> {
    if slot.is_none() {
        *slot = Some(FixtureSet::load(root, dim)?);
    }
    slot.as_ref()
        .ok_or_else(|| format!("fixture set for {} was not cached", T::KIND.tag()))
}

/// Lazily loads each element kind's fixtures the first time a case needs
/// them, then reuses them for the rest of the run.
#[derive(Debug)]
pub struct CaseRunner {
    root: PathBuf,
    dim: usize,
    f32_set: Option<FixtureSet<f32>>,
    f64_set: Option<FixtureSet<f64>>,
    c32_set: Option<FixtureSet<Complex<f32>>>,
    c64_set: Option<FixtureSet<Complex<f64>>>,
}

impl CaseRunner {
    #[must_use]
    pub fn new(root: &Path, dim: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            dim,
            f32_set: None,
            f64_set: None,
            c32_set: None,
            c64_set: None,
        }
    }

    /// `Err` only when the fixtures themselves cannot be loaded.
    pub fn run(&mut self, id: &CaseId) -> Result<CaseRun, String> {
        let run = match id.kind {
            ScalarKind::F32 => run_case(id.case, load_once(&mut self.f32_set, &self.root, self.dim)?),
            ScalarKind::F64 => run_case(id.case, load_once(&mut self.f64_set, &self.root, self.dim)?),
            ScalarKind::C32 => run_case(id.case, load_once(&mut self.c32_set, &self.root, self.dim)?),
            ScalarKind::C64 => run_case(id.case, load_once(&mut self.c64_set, &self.root, self.dim)?),
        };
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::{Case, CaseId, CaseRunner, Orientation, Suite, case_ids, run_case};
    use crate::fingerprint::{Scalar, fingerprint, fingerprint_abs};
    use crate::fixtures::{FixtureSet, FixtureSpec, generate_fixtures};
    use flo_linalg::{DenseMatrix, ScalarKind, SvdMode, SymmetryKind, UpLo, svd};
    use num_complex::Complex;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("flo_catalog_{name}_{ts}"))
    }

    #[test]
    fn ids_round_trip_through_display() {
        let id = CaseId::parse("driver.f64.syevd.lower").expect("known id");
        assert_eq!(id.suite, Suite::Driver);
        assert_eq!(id.kind, ScalarKind::F64);
        assert_eq!(id.case, Case::Syevd(UpLo::Lower));
        assert_eq!(id.to_string(), "driver.f64.syevd.lower");

        let svd = CaseId::parse("func.c64.svd.thin_wide").expect("svd id");
        assert_eq!(svd.case, Case::Svd(SvdMode::Thin, Orientation::Wide));
    }

    #[test]
    fn unknown_and_unsupported_ids_are_rejected() {
        assert!(CaseId::parse("driver.f64.syevd.sideways").is_none());
        assert!(CaseId::parse("func.f16.inv").is_none());
        assert!(CaseId::parse("kernel.f64.inv").is_none());
        assert!(CaseId::parse("func.f64").is_none());
        assert!(CaseId::parse("func.f64.solve_symmetric.her_lower").is_none());
        let her = CaseId::parse("func.c32.solve_symmetric.her_lower").expect("complex her");
        assert_eq!(her.case, Case::SolveSymmetric(UpLo::Lower, SymmetryKind::Hermitian));
        // Suite and case must agree.
        assert!(CaseId::parse("driver.f64.inv").is_none());
    }

    #[test]
    fn catalog_sizes_per_kind() {
        assert_eq!(case_ids(ScalarKind::F64, Some(Suite::Fixture)).len(), 2);
        assert_eq!(case_ids(ScalarKind::F64, Some(Suite::Driver)).len(), 13);
        assert_eq!(case_ids(ScalarKind::F64, Some(Suite::Func)).len(), 21);
        assert_eq!(case_ids(ScalarKind::C64, Some(Suite::Func)).len(), 23);
        assert_eq!(case_ids(ScalarKind::C32, None).len(), 38);
        for id in case_ids(ScalarKind::C64, None) {
            assert_eq!(CaseId::parse(&id.to_string()), Some(id));
        }
    }

    #[test]
    fn every_case_runs_on_small_fixtures() {
        let dir = temp_dir("all");
        generate_fixtures(&dir, FixtureSpec { seed: 42, dim: 6 }).expect("generate");
        let mut runner = CaseRunner::new(&dir, 6);
        for kind in ScalarKind::ALL {
            for id in case_ids(kind, None) {
                let run = runner.run(&id).expect("fixtures load");
                assert_eq!(run.fixture_id, format!("{}:6", kind.tag()));
                let outputs = run
                    .outputs
                    .unwrap_or_else(|err| panic!("{id} failed: {err}"));
                assert!(!outputs.is_empty(), "{id} produced no outputs");
                assert!(outputs.values().all(Scalar::is_finite), "{id} produced non-finite output");
            }
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_names_match_case_shape() {
        let dir = temp_dir("names");
        generate_fixtures(&dir, FixtureSpec { seed: 42, dim: 6 }).expect("generate");
        let set = FixtureSet::<Complex<f64>>::load(&dir, 6).expect("load");

        let fixture = run_case(Case::Fixture(crate::fixtures::FixtureRole::A), &set)
            .outputs
            .expect("fixture case");
        assert_eq!(fixture.get("fingerprint"), Some(&fingerprint(&set.a)));

        let names = |case| {
            run_case(case, &set)
                .outputs
                .expect("case runs")
                .into_keys()
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Case::Gesv), ["ipiv", "lu", "x"]);
        assert_eq!(names(Case::Svd(SvdMode::ValuesOnly, Orientation::Tall)), ["s"]);
        assert_eq!(names(Case::Svd(SvdMode::Full, Orientation::Tall)), ["abs_u", "abs_vt", "s"]);
        assert_eq!(names(Case::Slogdet), ["logabsdet", "sign"]);

        let pinv = run_case(Case::Pinv(Orientation::Wide), &set)
            .outputs
            .expect("pinv");
        assert!(matches!(pinv.get("rank"), Some(Scalar::Count(rank)) if *rank <= 3));
        let _ = std::fs::remove_dir_all(&dir);
    }

    /// For a tall `m × k` input the trailing `m - k` columns of the full `U`
    /// only need to span the null space of `Aᴴ`. Two such bases give two
    /// valid factorizations with different `|U|` fingerprints, so `abs_u` of
    /// `svd.full_tall` is tied to one LAPACK build and is not compared.
    #[test]
    fn full_u_fingerprint_depends_on_null_space_basis() {
        let a = DenseMatrix::<f64>::new(4, 2, vec![3.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0])
            .expect("tall");
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let unit: Vec<f64> = (0..16).map(|idx| if idx % 5 == 0 { 1.0 } else { 0.0 }).collect();
        let identity = DenseMatrix::new(4, 4, unit).expect("identity");
        #[rustfmt::skip]
        let rotated = DenseMatrix::new(4, 4, vec![
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, half, half,
            0.0, 0.0, half, -half,
        ])
        .expect("rotated");

        // The backend agrees on the leading columns; its completion is one
        // more orthonormal basis of the same null space.
        let full = svd(&a, SvdMode::Full).expect("full svd");
        assert!((full.s[0] - 3.0).abs() < 1e-12 && (full.s[1] - 2.0).abs() < 1e-12);
        let u = full.u.expect("u");
        for row in 0..4 {
            for col in 0..2 {
                let expected = identity.get(row, col).expect("e");
                assert!((u.get(row, col).expect("u").abs() - expected).abs() < 1e-12);
            }
            if row < 2 {
                for col in 2..4 {
                    assert!(u.get(row, col).expect("u").abs() < 1e-12);
                }
            }
        }

        let leading = |m: &DenseMatrix<f64>| {
            let values = (0..8).filter_map(|idx| m.get(idx / 2, idx % 2)).collect();
            DenseMatrix::new(4, 2, values).expect("leading")
        };
        assert_eq!(fingerprint_abs(&leading(&identity)), fingerprint_abs(&leading(&rotated)));

        let (Scalar::Real(plain), Scalar::Real(turned)) =
            (fingerprint_abs(&identity), fingerprint_abs(&rotated))
        else {
            panic!("abs fingerprints are real");
        };
        assert!((plain - turned).abs() > 0.5, "{plain} vs {turned}");
    }

    #[test]
    fn missing_fixtures_surface_as_harness_errors() {
        let mut runner = CaseRunner::new(&temp_dir("missing"), 6);
        let id = CaseId::parse("func.f64.inv").expect("id");
        let err = runner.run(&id).expect_err("no fixtures on disk");
        assert!(err.contains("failed reading"));
    }
}
