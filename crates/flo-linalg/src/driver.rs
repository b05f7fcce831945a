//! LAPACK driver conventions: packed LU, 0-based pivots, and triangular
//! factors written over the input without cleaning the opposite triangle.

use crate::backend::{
    PackedLu, cholesky_lower, from_dmatrix, full_from_triangle, sorted_eigen, to_dmatrix,
};
use crate::{
    DenseMatrix, EighItype, LinAlgError, OracleScalar, SymmetryKind, UpLo, validate_rhs_rows,
    validate_same_order, validate_square,
};
use nalgebra::DMatrix;

#[derive(Debug, Clone, PartialEq)]
pub struct EighOutput<T> {
    /// Ascending, widened to `f64`.
    pub w: Vec<f64>,
    /// Eigenvectors stored as columns.
    pub v: DenseMatrix<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetrfOutput<T> {
    pub lu: DenseMatrix<T>,
    pub ipiv: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GesvOutput<T> {
    pub lu: DenseMatrix<T>,
    pub ipiv: Vec<usize>,
    pub x: DenseMatrix<T>,
}

/// `syevd`/`heevd`: all eigenpairs of the matrix read from `uplo`.
pub fn syevd<T: OracleScalar>(a: &DenseMatrix<T>, uplo: UpLo) -> Result<EighOutput<T>, LinAlgError> {
    validate_square(a)?;
    let hermitian = full_from_triangle(&to_dmatrix(a), uplo, SymmetryKind::Hermitian);
    let (w, v) = sorted_eigen(hermitian)?;
    Ok(EighOutput {
        w,
        v: from_dmatrix(&v),
    })
}

/// `sygvd`/`hegvd` via Cholesky reduction to a standard problem.
///
/// With `B = L Lᴴ` the reduced matrix is `L⁻¹ A L⁻ᴴ` for itype 1 and
/// `Lᴴ A L` otherwise. Back-transformed eigenvectors satisfy
/// `xᴴ B x = 1` (itype 1, 2) or `xᴴ B⁻¹ x = 1` (itype 3).
pub fn sygvd<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
    uplo: UpLo,
    itype: EighItype,
) -> Result<EighOutput<T>, LinAlgError> {
    validate_same_order(a, b)?;
    let a_full = full_from_triangle(&to_dmatrix(a), uplo, SymmetryKind::Hermitian);
    let b_full = full_from_triangle(&to_dmatrix(b), uplo, SymmetryKind::Hermitian);
    let l = cholesky_lower(b_full)?;

    let reduced = match itype {
        EighItype::AxLBx => {
            let half = l
                .solve_lower_triangular(&a_full)
                .ok_or(LinAlgError::SolverSingularity)?;
            l.solve_lower_triangular(&half.adjoint())
                .ok_or(LinAlgError::SolverSingularity)?
        }
        EighItype::ABxLx | EighItype::BAxLx => l.adjoint() * &a_full * &l,
    };
    let (w, y) = sorted_eigen(symmetrize(reduced))?;

    let x = match itype {
        EighItype::AxLBx | EighItype::ABxLx => l
            .adjoint()
            .solve_upper_triangular(&y)
            .ok_or(LinAlgError::SolverSingularity)?,
        EighItype::BAxLx => &l * y,
    };
    Ok(EighOutput {
        w,
        v: from_dmatrix(&x),
    })
}

fn symmetrize<T: OracleScalar>(matrix: DMatrix<T>) -> DMatrix<T> {
    let half: T = nalgebra::convert(0.5);
    (matrix.adjoint() + &matrix) * half
}

/// `getrf`: partial-pivot LU of a square matrix. Singular input still
/// factors; the zero pivot is left in `U`.
pub fn getrf<T: OracleScalar>(a: &DenseMatrix<T>) -> Result<GetrfOutput<T>, LinAlgError> {
    validate_square(a)?;
    let lu = PackedLu::factor(to_dmatrix(a));
    Ok(GetrfOutput {
        lu: from_dmatrix(&lu.packed),
        ipiv: lu.ipiv,
    })
}

/// `getri`: inverse from `getrf` output.
pub fn getri<T: OracleScalar>(lu: &DenseMatrix<T>, ipiv: &[usize]) -> Result<DenseMatrix<T>, LinAlgError> {
    let n = validate_square(lu)?;
    validate_pivots(ipiv, n)?;
    let factors = PackedLu::from_parts(to_dmatrix(lu), ipiv.to_vec());
    let inverse = factors.solve(&DMatrix::identity(n, n))?;
    Ok(from_dmatrix(&inverse))
}

fn validate_pivots(ipiv: &[usize], n: usize) -> Result<(), LinAlgError> {
    if ipiv.len() != n {
        return Err(LinAlgError::ShapeContractViolation(
            "pivot vector length must equal matrix order",
        ));
    }
    if ipiv.iter().enumerate().any(|(row, &pivot)| pivot < row || pivot >= n) {
        return Err(LinAlgError::ShapeContractViolation(
            "pivot entries must satisfy row <= ipiv[row] < n",
        ));
    }
    Ok(())
}

/// `gesv`: factor `A` and solve `A X = B`.
pub fn gesv<T: OracleScalar>(a: &DenseMatrix<T>, b: &DenseMatrix<T>) -> Result<GesvOutput<T>, LinAlgError> {
    validate_rhs_rows(a, b)?;
    let factors = PackedLu::factor(to_dmatrix(a));
    let x = factors.solve(&to_dmatrix(b))?;
    Ok(GesvOutput {
        lu: from_dmatrix(&factors.packed),
        ipiv: factors.ipiv,
        x: from_dmatrix(&x),
    })
}

/// `potrf` with `clean = 0`: the factor overwrites the selected triangle
/// (`L` for lower, `U = Lᴴ` for upper) and the other triangle keeps `b`.
pub fn potrf<T: OracleScalar>(b: &DenseMatrix<T>, uplo: UpLo) -> Result<DenseMatrix<T>, LinAlgError> {
    validate_square(b)?;
    let source = to_dmatrix(b);
    let l = cholesky_lower(full_from_triangle(&source, uplo, SymmetryKind::Hermitian))?;
    let n = source.nrows();
    let written = DMatrix::from_fn(n, n, |row, col| {
        if !uplo.contains(row, col) {
            source[(row, col)]
        } else {
            match uplo {
                UpLo::Lower => l[(row, col)],
                UpLo::Upper => l[(col, row)].conjugate(),
            }
        }
    });
    Ok(from_dmatrix(&written))
}

/// `sysv` (`kind = Symmetric`) or `hesv` (`kind = Hermitian`): solve with the
/// matrix read from `uplo`. Only the solution is reported.
pub fn sysv<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
    uplo: UpLo,
    kind: SymmetryKind,
) -> Result<DenseMatrix<T>, LinAlgError> {
    validate_rhs_rows(a, b)?;
    let full = full_from_triangle(&to_dmatrix(a), uplo, kind);
    let factors = PackedLu::factor(full);
    let x = factors.solve(&to_dmatrix(b))?;
    Ok(from_dmatrix(&x))
}
