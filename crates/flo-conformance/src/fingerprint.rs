//! Order-, sign- and precision-sensitive reduction of an array to a scalar.
//!
//! `fingerprint(x) = Σ cos(i) · x[i]` over the row-major flattening,
//! accumulated in double precision.

use flo_linalg::{DenseMatrix, OracleScalar};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Exact integer output such as a numerical rank.
    Count(u64),
    Real(f64),
    Complex([f64; 2]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rel_tol: f64,
    pub abs_tol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rel_tol: crate::DEFAULT_REL_TOL,
            abs_tol: crate::DEFAULT_ABS_TOL,
        }
    }
}

impl Scalar {
    #[must_use]
    pub fn from_c64(value: Complex<f64>) -> Self {
        Self::Complex([value.re, value.im])
    }

    /// Real element kinds collapse to `Real`, complex kinds keep both parts.
    #[must_use]
    pub fn of<T: OracleScalar>(value: T) -> Self {
        let widened = value.to_c64();
        if T::KIND.is_complex() {
            Self::from_c64(widened)
        } else {
            Self::Real(widened.re)
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Count(_) => true,
            Self::Real(value) => value.is_finite(),
            Self::Complex([re, im]) => re.is_finite() && im.is_finite(),
        }
    }

    /// NumPy `isclose` with `self` as the expected value:
    /// `|actual - expected| <= abs_tol + rel_tol * |expected|`.
    /// Counts compare exactly; real and complex values never match a count.
    #[must_use]
    pub fn is_close(&self, actual: &Self, tolerance: Tolerance) -> bool {
        match (self, actual) {
            (Self::Count(expected), Self::Count(actual)) => expected == actual,
            (Self::Count(_), _) | (_, Self::Count(_)) => false,
            (expected, actual) => {
                let expected = expected.as_c64();
                let actual = actual.as_c64();
                (actual - expected).norm() <= tolerance.abs_tol + tolerance.rel_tol * expected.norm()
            }
        }
    }

    fn as_c64(self) -> Complex<f64> {
        match self {
            Self::Count(value) => Complex::new(value as f64, 0.0),
            Self::Real(value) => Complex::new(value, 0.0),
            Self::Complex([re, im]) => Complex::new(re, im),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value:?}"),
            Self::Complex([re, im]) => {
                if *im < 0.0 {
                    write!(f, "{re:?}{im:?}j")
                } else {
                    write!(f, "{re:?}+{im:?}j")
                }
            }
        }
    }
}

#[must_use]
pub fn fingerprint_real<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| (idx as f64).cos() * value)
        .sum()
}

#[must_use]
pub fn fingerprint_complex<I>(values: I) -> Complex<f64>
where
    I: IntoIterator<Item = Complex<f64>>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| value * (idx as f64).cos())
        .sum()
}

#[must_use]
pub fn fingerprint<T: OracleScalar>(values: &[T]) -> Scalar {
    if T::KIND.is_complex() {
        Scalar::from_c64(fingerprint_complex(values.iter().map(|value| value.to_c64())))
    } else {
        Scalar::Real(fingerprint_real(values.iter().map(|value| value.to_c64().re)))
    }
}

#[must_use]
pub fn fingerprint_matrix<T: OracleScalar>(matrix: &DenseMatrix<T>) -> Scalar {
    fingerprint(matrix.as_slice())
}

/// Fingerprint of element moduli; insensitive to per-column sign or phase.
#[must_use]
pub fn fingerprint_abs<T: OracleScalar>(matrix: &DenseMatrix<T>) -> Scalar {
    Scalar::Real(fingerprint_real(
        matrix.as_slice().iter().map(|value| value.to_c64().norm()),
    ))
}

#[must_use]
pub fn fingerprint_f64(values: &[f64]) -> Scalar {
    Scalar::Real(fingerprint_real(values.iter().copied()))
}

#[must_use]
pub fn fingerprint_indices(values: &[usize]) -> Scalar {
    Scalar::Real(fingerprint_real(values.iter().map(|&value| value as f64)))
}
