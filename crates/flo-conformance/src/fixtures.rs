//! Seeded fixture vectors and their `.npy` persistence.
//!
//! One legacy Gaussian stream seeded with `seed` yields four consecutive
//! `randn(dim²)` draws. Real fixtures take `a` from the first and `b` from
//! the second; complex fixtures pair them as `randn + 1j*randn` does, so
//! `a = d0 + i·d1` and `b = d2 + i·d3`. Single-precision fixtures are the
//! double-precision ones rounded after projection.

use crate::fingerprint::{Scalar, fingerprint};
use crate::{sha256_hex, validate_dim};
use flo_linalg::{DenseMatrix, OracleScalar, ScalarKind, UpLo, spectral_reconstruct, syevd};
use flo_random::LegacyGaussian;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureRole {
    /// General square matrix.
    A,
    /// Symmetric / Hermitian positive-definite matrix.
    B,
}

impl FixtureRole {
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

#[must_use]
pub fn fixture_file_name(role: FixtureRole, kind: ScalarKind) -> String {
    format!("{}-{}.npy", role.as_str(), kind.tag())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureSpec {
    pub seed: u32,
    pub dim: usize,
}

impl FixtureSpec {
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.dim * self.dim
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureManifestEntry {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
    pub sha256: String,
    pub fingerprint: Scalar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureManifest {
    pub seed: u32,
    pub dim: usize,
    pub entries: Vec<FixtureManifestEntry>,
}

/// Four consecutive `randn(dim²)` draws, in stream order.
struct GaussianDraws {
    d0: Vec<f64>,
    d1: Vec<f64>,
    d2: Vec<f64>,
    d3: Vec<f64>,
}

fn draw(spec: FixtureSpec) -> Result<GaussianDraws, String> {
    let len = spec.element_count();
    let mut rng = LegacyGaussian::seeded(spec.seed);
    let mut next = || {
        rng.randn(len)
            .map_err(|err| format!("fixture draw failed ({}): {err}", err.reason_code()))
    };
    Ok(GaussianDraws {
        d0: next()?,
        d1: next()?,
        d2: next()?,
        d3: next()?,
    })
}

/// Replace `M` by the positive-definite matrix with the eigenvectors of its
/// Hermitian part and eigenvalues `|λ| + 1`.
pub fn project_positive_definite<T: OracleScalar>(values: &[T], dim: usize) -> Result<Vec<T>, String> {
    let projection_error = |err: flo_linalg::LinAlgError| {
        format!("positive-definite projection failed ({}): {err}", err.reason_code())
    };
    let matrix = DenseMatrix::new(dim, dim, values.to_vec()).map_err(projection_error)?;
    let hermitian = matrix.hermitian_part().map_err(projection_error)?;
    let spectrum = syevd(&hermitian, UpLo::Lower).map_err(projection_error)?;
    let shifted: Vec<f64> = spectrum.w.iter().map(|value| value.abs() + 1.0).collect();
    let rebuilt = spectral_reconstruct(&spectrum.v, &shifted).map_err(projection_error)?;
    let symmetric = rebuilt.hermitian_part().map_err(projection_error)?;
    Ok(symmetric.into_vec())
}

fn pair(re: &[f64], im: &[f64]) -> Vec<Complex<f64>> {
    re.iter()
        .zip(im)
        .map(|(&re, &im)| Complex::new(re, im))
        .collect()
}

fn narrow<T: OracleScalar>(values: &[Complex<f64>]) -> Vec<T> {
    values
        .iter()
        .map(|value| T::from_parts(value.re, value.im))
        .collect()
}

fn write_fixture<T: OracleScalar>(
    dir: &Path,
    role: FixtureRole,
    values: &[T],
) -> Result<FixtureManifestEntry, String> {
    let name = fixture_file_name(role, T::KIND);
    let path = dir.join(&name);
    let encoded = flo_io::encode_array(&[values.len()], values)
        .map_err(|err| format!("failed encoding {}: {err}", path.display()))?;
    fs::write(&path, &encoded).map_err(|err| format!("failed writing {}: {err}", path.display()))?;
    Ok(FixtureManifestEntry {
        name,
        dtype: <T as flo_io::NpyElement>::DTYPE.descr().to_string(),
        shape: vec![values.len()],
        sha256: sha256_hex(&encoded),
        fingerprint: fingerprint(values),
    })
}

/// Write all eight fixtures (`{a,b}-{f32,f64,c32,c64}.npy`) plus
/// `manifest.json` into `dir`.
pub fn generate_fixtures(dir: &Path, spec: FixtureSpec) -> Result<FixtureManifest, String> {
    validate_dim(spec.dim)?;
    fs::create_dir_all(dir).map_err(|err| format!("failed creating {}: {err}", dir.display()))?;

    let draws = draw(spec)?;
    let a_real: Vec<Complex<f64>> = draws.d0.iter().map(|&re| Complex::new(re, 0.0)).collect();
    let b_real = project_positive_definite(&draws.d1, spec.dim)?
        .into_iter()
        .map(|re| Complex::new(re, 0.0))
        .collect::<Vec<_>>();
    let a_complex = pair(&draws.d0, &draws.d1);
    let b_complex = project_positive_definite(&pair(&draws.d2, &draws.d3), spec.dim)?;

    let entries = vec![
        write_fixture(dir, FixtureRole::A, &narrow::<f32>(&a_real))?,
        write_fixture(dir, FixtureRole::B, &narrow::<f32>(&b_real))?,
        write_fixture(dir, FixtureRole::A, &narrow::<f64>(&a_real))?,
        write_fixture(dir, FixtureRole::B, &narrow::<f64>(&b_real))?,
        write_fixture(dir, FixtureRole::A, &narrow::<Complex<f32>>(&a_complex))?,
        write_fixture(dir, FixtureRole::B, &narrow::<Complex<f32>>(&b_complex))?,
        write_fixture(dir, FixtureRole::A, &a_complex)?,
        write_fixture(dir, FixtureRole::B, &b_complex)?,
    ];
    let manifest = FixtureManifest {
        seed: spec.seed,
        dim: spec.dim,
        entries,
    };

    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let payload = serde_json::to_string_pretty(&manifest)
        .map_err(|err| format!("failed serializing fixture manifest: {err}"))?;
    fs::write(&manifest_path, payload.as_bytes())
        .map_err(|err| format!("failed writing {}: {err}", manifest_path.display()))?;
    Ok(manifest)
}

#[must_use]
pub fn fixture_path(dir: &Path, role: FixtureRole, kind: ScalarKind) -> PathBuf {
    dir.join(fixture_file_name(role, kind))
}

/// Load one fixture vector, checking its element type and length.
pub fn load_fixture<T: OracleScalar>(dir: &Path, role: FixtureRole, dim: usize) -> Result<Vec<T>, String> {
    let path = fixture_path(dir, role, T::KIND);
    let raw = fs::read(&path).map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    let values = decode_fixture::<T>(&raw)
        .map_err(|err| format!("invalid fixture {}: {err}", path.display()))?;
    let expected = dim * dim;
    if values.len() != expected {
        return Err(format!(
            "fixture {} holds {} elements, expected {expected} for dim {dim}",
            path.display(),
            values.len()
        ));
    }
    Ok(values)
}

fn decode_fixture<T: OracleScalar>(raw: &[u8]) -> Result<Vec<T>, flo_io::IOError> {
    let array = flo_io::read_npy_bytes(raw)?;
    if array.header.fortran_order && array.header.shape.len() > 1 {
        return Err(flo_io::IOError::HeaderSchemaInvalid(
            "fortran-ordered fixtures are not supported",
        ));
    }
    flo_io::decode_elements::<T>(&array)
}

/// Both fixture roles for one element kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSet<T> {
    pub dim: usize,
    pub a: Vec<T>,
    pub b: Vec<T>,
    /// SHA-256 over the `a` then `b` payload bytes.
    pub input_digest: String,
}

impl<T: OracleScalar> FixtureSet<T> {
    pub fn load(dir: &Path, dim: usize) -> Result<Self, String> {
        validate_dim(dim)?;
        let a = load_fixture::<T>(dir, FixtureRole::A, dim)?;
        let b = load_fixture::<T>(dir, FixtureRole::B, dim)?;
        let mut payload = flo_io::encode_elements(&a);
        payload.extend_from_slice(&flo_io::encode_elements(&b));
        Ok(Self {
            dim,
            input_digest: sha256_hex(&payload),
            a,
            b,
        })
    }

    #[must_use]
    pub fn role(&self, role: FixtureRole) -> &[T] {
        match role {
            FixtureRole::A => &self.a,
            FixtureRole::B => &self.b,
        }
    }

    #[must_use]
    pub fn fixture_id(&self) -> String {
        format!("{}:{}", T::KIND.tag(), self.dim)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FixtureRole, FixtureSet, FixtureSpec, MANIFEST_FILE_NAME, draw, fixture_file_name,
        generate_fixtures, load_fixture, pair, project_positive_definite,
    };
    use crate::HarnessConfig;
    use crate::expectations::load_expectations;
    use crate::fingerprint::{Scalar, Tolerance, fingerprint};
    use flo_random::LegacyGaussian;
    use flo_linalg::{DenseMatrix, ScalarKind, UpLo, cholesky};
    use num_complex::Complex;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("flo_fixtures_{name}_{ts}"))
    }

    #[test]
    fn file_names_follow_role_and_kind() {
        assert_eq!(fixture_file_name(FixtureRole::A, ScalarKind::F64), "a-f64.npy");
        assert_eq!(fixture_file_name(FixtureRole::B, ScalarKind::C32), "b-c32.npy");
    }

    #[test]
    fn draws_follow_numpy_seed_42_stream() {
        let draws = draw(FixtureSpec { seed: 42, dim: 6 }).expect("draw");
        assert!((draws.d0[0] - 0.4967141530112327).abs() < 1e-12);
        assert!((draws.d0[1] + 0.13826430117118466).abs() < 1e-12);
        // randn(36) continues where the previous 36 values stopped.
        let mut stream = LegacyGaussian::seeded(42);
        let flat = stream.randn(4 * 36).expect("flat draw");
        assert_eq!(draws.d1, &flat[36..72]);
        assert_eq!(draws.d3, &flat[108..]);
    }

    #[test]
    fn seed_42_draw_fingerprints_match_numpy_at_dim_1024() {
        let draws = draw(FixtureSpec { seed: 42, dim: 1024 }).expect("draw");
        let tolerance = Tolerance::default();
        let known = [
            (&draws.d0, 191.289000051022),
            (&draws.d1, 217.503862878236),
            (&draws.d2, 810.750137456061),
            (&draws.d3, 146.108851348641),
        ];
        for (values, expected) in known {
            let actual = fingerprint(values.as_slice());
            assert!(
                Scalar::Real(expected).is_close(&actual, tolerance),
                "expected {expected}, got {actual}"
            );
        }

        let reference = HarnessConfig::default_paths().expectation_root;
        let shipped = |file: &str, id: &str| {
            let table = load_expectations(&reference.join(file)).expect("shipped table");
            let case = table
                .cases
                .into_iter()
                .find(|case| case.id == id)
                .unwrap_or_else(|| panic!("{id} missing from {file}"));
            case.outputs["fingerprint"]
        };
        let real_a = fingerprint(draws.d0.as_slice());
        let expected = shipped("lapack_driver_f64.json", "fixture.f64.a");
        assert!(expected.is_close(&real_a, tolerance), "f64 a: {real_a} vs {expected}");
        let complex_a = fingerprint(&pair(&draws.d0, &draws.d1));
        let expected = shipped("lapack_func_c64.json", "fixture.c64.a");
        assert!(expected.is_close(&complex_a, tolerance), "c64 a: {complex_a} vs {expected}");
    }

    #[test]
    fn complex_fixtures_pair_consecutive_draws() {
        let dir = temp_dir("pairing");
        let spec = FixtureSpec { seed: 42, dim: 6 };
        generate_fixtures(&dir, spec).expect("generate");
        let draws = draw(spec).expect("draw");
        let c64_set = FixtureSet::<Complex<f64>>::load(&dir, 6).expect("c64 set");
        for (idx, value) in c64_set.a.iter().enumerate() {
            assert_eq!(value.re, draws.d0[idx]);
            assert_eq!(value.im, draws.d1[idx]);
        }
        let raw_b = pair(&draws.d2, &draws.d3);
        let projected = project_positive_definite(&raw_b, 6).expect("project");
        assert_eq!(c64_set.b, projected);
        let f64_set = FixtureSet::<f64>::load(&dir, 6).expect("f64 set");
        assert_eq!(f64_set.a, draws.d0);
        assert_eq!(f64_set.b, project_positive_definite(&draws.d1, 6).expect("project"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn projection_is_symmetric_positive_definite() {
        let draws = draw(FixtureSpec { seed: 7, dim: 6 }).expect("draw");
        let projected = project_positive_definite(&draws.d1, 6).expect("project");
        let matrix = DenseMatrix::new(6, 6, projected).expect("matrix");
        for row in 0..6 {
            for col in 0..6 {
                assert_eq!(matrix.get(row, col), matrix.get(col, row));
            }
        }
        cholesky(&matrix, UpLo::Lower).expect("projected matrix admits cholesky");
    }

    #[test]
    fn complex_projection_is_hermitian() {
        let values: Vec<Complex<f64>> = (0..36)
            .map(|idx| Complex::new(f64::from(idx % 5) - 2.0, f64::from(idx % 3) - 1.0))
            .collect();
        let projected = project_positive_definite(&values, 6).expect("project");
        let matrix = DenseMatrix::new(6, 6, projected).expect("matrix");
        for row in 0..6 {
            assert_eq!(matrix.get(row, row).expect("diag").im, 0.0);
            for col in 0..6 {
                let upper = matrix.get(row, col).expect("upper");
                let lower = matrix.get(col, row).expect("lower");
                assert_eq!(upper, lower.conj());
            }
        }
        cholesky(&matrix, UpLo::Upper).expect("projected matrix admits cholesky");
    }

    #[test]
    fn generation_is_reproducible_and_loadable() {
        let first = temp_dir("first");
        let second = temp_dir("second");
        let spec = FixtureSpec { seed: 42, dim: 6 };
        let manifest = generate_fixtures(&first, spec).expect("generate");
        let again = generate_fixtures(&second, spec).expect("regenerate");
        assert_eq!(manifest.entries.len(), 8);
        assert_eq!(manifest, again);
        assert!(first.join(MANIFEST_FILE_NAME).exists());

        let f64_set = FixtureSet::<f64>::load(&first, 6).expect("f64 set");
        let f32_a = load_fixture::<f32>(&first, FixtureRole::A, 6).expect("f32 a");
        for (wide, narrow) in f64_set.a.iter().zip(&f32_a) {
            assert_eq!(*wide as f32, *narrow);
        }
        let c64_set = FixtureSet::<Complex<f64>>::load(&first, 6).expect("c64 set");
        assert_eq!(c64_set.a[0].re, f64_set.a[0]);
        assert_eq!(c64_set.fixture_id(), "c64:6");

        let err = load_fixture::<f64>(&first, FixtureRole::A, 8).expect_err("wrong dim");
        assert!(err.contains("expected 64"));

        let _ = std::fs::remove_dir_all(&first);
        let _ = std::fs::remove_dir_all(&second);
    }
}
