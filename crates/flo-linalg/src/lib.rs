#![forbid(unsafe_code)]

//! Dense linear-algebra boundary exercised by the validation harness.
//!
//! Two layers are exposed. [`driver`] follows LAPACK driver conventions
//! (packed factors, 0-based pivots, uncleaned triangles) and [`func`]
//! follows NumPy/SciPy function conventions. Both take row-major
//! [`DenseMatrix`] views and return fresh buffers.

use core::fmt;
use nalgebra::ComplexField;
use num_complex::Complex;

mod backend;
pub mod driver;
pub mod func;

pub use driver::{EighOutput, GesvOutput, GetrfOutput, gesv, getrf, getri, potrf, syevd, sygvd, sysv};
pub use func::{
    SvdOutput, cholesky, det, eigh, eigh_generalized, inv, pinv, slogdet, solve_general,
    solve_symmetric, solve_triangular, spectral_reconstruct, svd,
};

pub const MAX_MATRIX_ELEMENTS: usize = 1 << 28;

pub const LINALG_REASON_CODES: [&str; 8] = [
    "linalg_shape_contract_violation",
    "linalg_solver_singularity",
    "linalg_cholesky_contract_violation",
    "linalg_svd_nonconvergence",
    "linalg_spectral_convergence_failed",
    "linalg_itype_invalid",
    "linalg_uplo_invalid",
    "linalg_tolerance_policy_violation",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinAlgError {
    ShapeContractViolation(&'static str),
    SolverSingularity,
    CholeskyContractViolation(&'static str),
    SvdNonConvergence,
    SpectralConvergenceFailed,
    ItypeInvalid,
    UpLoInvalid,
    TolerancePolicyViolation(&'static str),
}

impl LinAlgError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ShapeContractViolation(_) => "linalg_shape_contract_violation",
            Self::SolverSingularity => "linalg_solver_singularity",
            Self::CholeskyContractViolation(_) => "linalg_cholesky_contract_violation",
            Self::SvdNonConvergence => "linalg_svd_nonconvergence",
            Self::SpectralConvergenceFailed => "linalg_spectral_convergence_failed",
            Self::ItypeInvalid => "linalg_itype_invalid",
            Self::UpLoInvalid => "linalg_uplo_invalid",
            Self::TolerancePolicyViolation(_) => "linalg_tolerance_policy_violation",
        }
    }
}

impl fmt::Display for LinAlgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeContractViolation(msg) => write!(f, "{msg}"),
            Self::SolverSingularity => write!(f, "solve/inv rejected singular matrix"),
            Self::CholeskyContractViolation(msg) => write!(f, "{msg}"),
            Self::SvdNonConvergence => write!(f, "svd did not converge"),
            Self::SpectralConvergenceFailed => write!(f, "spectral decomposition did not converge"),
            Self::ItypeInvalid => write!(f, "generalized eigenproblem itype must be 1, 2 or 3"),
            Self::UpLoInvalid => write!(f, "uplo must be L or U"),
            Self::TolerancePolicyViolation(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for LinAlgError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpLo {
    Lower,
    Upper,
}

impl UpLo {
    pub fn from_token(token: &str) -> Result<Self, LinAlgError> {
        match token.trim() {
            "L" | "l" | "lower" => Ok(Self::Lower),
            "U" | "u" | "upper" => Ok(Self::Upper),
            _ => Err(LinAlgError::UpLoInvalid),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    /// Whether `(row, col)` lies in the selected triangle, diagonal included.
    #[must_use]
    pub fn contains(self, row: usize, col: usize) -> bool {
        match self {
            Self::Lower => row >= col,
            Self::Upper => row <= col,
        }
    }
}

/// Generalized symmetric-definite eigenproblem variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EighItype {
    /// `A x = λ B x`
    AxLBx = 1,
    /// `A B x = λ x`
    ABxLx = 2,
    /// `B A x = λ x`
    BAxLx = 3,
}

impl EighItype {
    pub fn from_code(code: u8) -> Result<Self, LinAlgError> {
        match code {
            1 => Ok(Self::AxLBx),
            2 => Ok(Self::ABxLx),
            3 => Ok(Self::BAxLx),
            _ => Err(LinAlgError::ItypeInvalid),
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymmetryKind {
    Symmetric,
    Hermitian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvdMode {
    Full,
    Thin,
    ValuesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    F32,
    F64,
    C32,
    C64,
}

impl ScalarKind {
    pub const ALL: [Self; 4] = [Self::F32, Self::F64, Self::C32, Self::C64];

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::C32 => "c32",
            Self::C64 => "c64",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    #[must_use]
    pub fn is_complex(self) -> bool {
        matches!(self, Self::C32 | Self::C64)
    }
}

/// Element types accepted by the backend.
pub trait OracleScalar: ComplexField + Copy + flo_io::NpyElement {
    const KIND: ScalarKind;

    /// Build from a `(re, im)` draw; real types drop `im`.
    fn from_parts(re: f64, im: f64) -> Self;

    fn to_c64(self) -> Complex<f64>;

    fn real_to_f64(value: Self::RealField) -> f64;
}

impl OracleScalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;

    fn from_parts(re: f64, _im: f64) -> Self {
        re as f32
    }

    fn to_c64(self) -> Complex<f64> {
        Complex::new(f64::from(self), 0.0)
    }

    fn real_to_f64(value: f32) -> f64 {
        f64::from(value)
    }
}

impl OracleScalar for f64 {
    const KIND: ScalarKind = ScalarKind::F64;

    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }

    fn to_c64(self) -> Complex<f64> {
        Complex::new(self, 0.0)
    }

    fn real_to_f64(value: f64) -> f64 {
        value
    }
}

impl OracleScalar for Complex<f32> {
    const KIND: ScalarKind = ScalarKind::C32;

    fn from_parts(re: f64, im: f64) -> Self {
        Complex::new(re as f32, im as f32)
    }

    fn to_c64(self) -> Complex<f64> {
        Complex::new(f64::from(self.re), f64::from(self.im))
    }

    fn real_to_f64(value: f32) -> f64 {
        f64::from(value)
    }
}

impl OracleScalar for Complex<f64> {
    const KIND: ScalarKind = ScalarKind::C64;

    fn from_parts(re: f64, im: f64) -> Self {
        Complex::new(re, im)
    }

    fn to_c64(self) -> Complex<f64> {
        self
    }

    fn real_to_f64(value: f64) -> f64 {
        value
    }
}

/// Row-major `rows × cols` buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: OracleScalar> DenseMatrix<T> {
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, LinAlgError> {
        validate_matrix_shape(rows, cols)?;
        if rows * cols != data.len() {
            return Err(LinAlgError::ShapeContractViolation(
                "matrix buffer length must equal rows*cols",
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Reshape the leading `rows*cols` elements of a flat buffer.
    pub fn from_leading(values: &[T], rows: usize, cols: usize) -> Result<Self, LinAlgError> {
        validate_matrix_shape(rows, cols)?;
        let needed = rows * cols;
        if values.len() < needed {
            return Err(LinAlgError::ShapeContractViolation(
                "source buffer shorter than requested reshape",
            ));
        }
        Ok(Self {
            rows,
            cols,
            data: values[..needed].to_vec(),
        })
    }

    pub fn column(values: Vec<T>) -> Result<Self, LinAlgError> {
        let rows = values.len();
        Self::new(rows, 1, values)
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// `(M + Mᴴ) / 2`.
    pub fn hermitian_part(&self) -> Result<Self, LinAlgError> {
        let n = validate_square(self)?;
        let half: T = nalgebra::convert(0.5);
        let mut data = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let upper = self.data[row * n + col];
                let lower = self.data[col * n + row].conjugate();
                data.push((upper + lower) * half);
            }
        }
        Ok(Self {
            rows: n,
            cols: n,
            data,
        })
    }

    #[must_use]
    pub fn map<U: OracleScalar>(&self, f: impl Fn(T) -> U) -> DenseMatrix<U> {
        DenseMatrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().copied().map(f).collect(),
        }
    }
}

pub fn validate_matrix_shape(rows: usize, cols: usize) -> Result<(usize, usize), LinAlgError> {
    if rows == 0 || cols == 0 {
        return Err(LinAlgError::ShapeContractViolation(
            "matrix rows/cols must be non-zero",
        ));
    }
    let elements = rows
        .checked_mul(cols)
        .ok_or(LinAlgError::ShapeContractViolation(
            "matrix element count overflowed",
        ))?;
    if elements > MAX_MATRIX_ELEMENTS {
        return Err(LinAlgError::ShapeContractViolation(
            "matrix exceeded bounded element budget",
        ));
    }
    Ok((rows, cols))
}

pub fn validate_square<T: OracleScalar>(matrix: &DenseMatrix<T>) -> Result<usize, LinAlgError> {
    if !matrix.is_square() {
        return Err(LinAlgError::ShapeContractViolation(
            "square matrix required for solve/inv/cholesky/eigh",
        ));
    }
    Ok(matrix.rows())
}

fn validate_same_order<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
) -> Result<usize, LinAlgError> {
    let n = validate_square(a)?;
    if validate_square(b)? != n {
        return Err(LinAlgError::ShapeContractViolation(
            "generalized problem requires matrices of equal order",
        ));
    }
    Ok(n)
}

fn validate_rhs_rows<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
) -> Result<usize, LinAlgError> {
    let n = validate_square(a)?;
    if b.rows() != n {
        return Err(LinAlgError::ShapeContractViolation(
            "right-hand side rows must match coefficient order",
        ));
    }
    Ok(n)
}
