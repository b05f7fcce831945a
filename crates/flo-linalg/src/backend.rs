//! Bridges between row-major [`DenseMatrix`] buffers and nalgebra.

use crate::{DenseMatrix, LinAlgError, OracleScalar, SymmetryKind, UpLo};
use nalgebra::{ComplexField, DMatrix, DVector, SymmetricEigen, SVD};

pub(crate) fn to_dmatrix<T: OracleScalar>(matrix: &DenseMatrix<T>) -> DMatrix<T> {
    DMatrix::from_row_slice(matrix.rows(), matrix.cols(), matrix.as_slice())
}

pub(crate) fn from_dmatrix<T: OracleScalar>(matrix: &DMatrix<T>) -> DenseMatrix<T> {
    // The transpose's column-major storage is the row-major order we want.
    DenseMatrix {
        rows: matrix.nrows(),
        cols: matrix.ncols(),
        data: matrix.transpose().as_slice().to_vec(),
    }
}

pub(crate) fn real_of<T: OracleScalar>(value: T) -> f64 {
    T::real_to_f64(value.real())
}

pub(crate) fn modulus_of<T: OracleScalar>(value: T) -> f64 {
    T::real_to_f64(value.modulus())
}

pub(crate) fn from_f64<T: OracleScalar>(value: f64) -> T {
    nalgebra::convert(value)
}

/// Full matrix rebuilt from the selected triangle. The Hermitian variant
/// drops the imaginary part of the diagonal, matching LAPACK `he*` routines.
pub(crate) fn full_from_triangle<T: OracleScalar>(
    matrix: &DMatrix<T>,
    uplo: UpLo,
    kind: SymmetryKind,
) -> DMatrix<T> {
    let n = matrix.nrows();
    DMatrix::from_fn(n, n, |row, col| {
        if row == col {
            match kind {
                SymmetryKind::Symmetric => matrix[(row, col)],
                SymmetryKind::Hermitian => from_f64(real_of(matrix[(row, col)])),
            }
        } else if uplo.contains(row, col) {
            matrix[(row, col)]
        } else {
            match kind {
                SymmetryKind::Symmetric => matrix[(col, row)],
                SymmetryKind::Hermitian => matrix[(col, row)].conjugate(),
            }
        }
    })
}

/// Eigenpairs of a Hermitian matrix, eigenvalues ascending and eigenvector
/// columns permuted to match.
pub(crate) fn sorted_eigen<T: OracleScalar>(
    hermitian: DMatrix<T>,
) -> Result<(Vec<f64>, DMatrix<T>), LinAlgError> {
    let n = hermitian.nrows();
    let eigen = SymmetricEigen::new(hermitian);
    let values: Vec<f64> = eigen
        .eigenvalues
        .iter()
        .map(|value| T::real_to_f64(value.clone()))
        .collect();
    if values.iter().any(|value| !value.is_finite()) {
        return Err(LinAlgError::SpectralConvergenceFailed);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&lhs, &rhs| values[lhs].total_cmp(&values[rhs]));
    let vectors = DMatrix::from_fn(n, n, |row, col| eigen.eigenvectors[(row, order[col])]);
    let sorted = order.iter().map(|&idx| values[idx]).collect();
    Ok((sorted, vectors))
}

/// Lower Cholesky factor of a Hermitian positive-definite matrix.
pub(crate) fn cholesky_lower<T: OracleScalar>(
    hermitian: DMatrix<T>,
) -> Result<DMatrix<T>, LinAlgError> {
    hermitian
        .cholesky()
        .map(|factor| factor.l())
        .ok_or(LinAlgError::CholeskyContractViolation(
            "matrix is not positive definite on selected triangle",
        ))
}

pub(crate) struct PackedLu<T: OracleScalar> {
    /// Strict lower part holds unit-lower `L`, the rest holds `U`.
    pub packed: DMatrix<T>,
    /// Row `k` was interchanged with row `ipiv[k]`, applied in order.
    pub ipiv: Vec<usize>,
}

impl<T: OracleScalar> PackedLu<T> {
    pub fn factor(matrix: DMatrix<T>) -> Self {
        let n = matrix.nrows();
        let lu = matrix.lu();
        let lower = lu.l();
        let upper = lu.u();

        let mut order = DVector::from_fn(n, |row, _| row);
        lu.p().permute_rows(&mut order);
        let ipiv = interchanges_from_order(order.as_slice());

        let packed = DMatrix::from_fn(n, n, |row, col| {
            if row > col {
                lower[(row, col)]
            } else {
                upper[(row, col)]
            }
        });
        Self { packed, ipiv }
    }

    pub fn from_parts(packed: DMatrix<T>, ipiv: Vec<usize>) -> Self {
        Self { packed, ipiv }
    }

    pub fn is_singular(&self) -> bool {
        (0..self.packed.nrows()).any(|idx| modulus_of(self.packed[(idx, idx)]) == 0.0)
    }

    pub fn swap_count(&self) -> usize {
        self.ipiv
            .iter()
            .enumerate()
            .filter(|(row, pivot)| *row != **pivot)
            .count()
    }

    /// Solve `A X = B` with the packed factors.
    pub fn solve(&self, rhs: &DMatrix<T>) -> Result<DMatrix<T>, LinAlgError> {
        if self.is_singular() {
            return Err(LinAlgError::SolverSingularity);
        }
        let n = self.packed.nrows();
        let mut permuted = rhs.clone();
        for (row, &pivot) in self.ipiv.iter().enumerate() {
            if pivot != row {
                permuted.swap_rows(row, pivot);
            }
        }

        let unit_lower = DMatrix::from_fn(n, n, |row, col| {
            if row == col {
                nalgebra::one()
            } else if row > col {
                self.packed[(row, col)]
            } else {
                nalgebra::zero()
            }
        });
        let forward = unit_lower
            .solve_lower_triangular(&permuted)
            .ok_or(LinAlgError::SolverSingularity)?;
        let upper = self.packed.upper_triangle();
        upper
            .solve_upper_triangular(&forward)
            .ok_or(LinAlgError::SolverSingularity)
    }
}

/// LAPACK-style sequential interchanges reproducing a final row order,
/// where `order[k]` is the source row that ends up at position `k`.
pub(crate) fn interchanges_from_order(order: &[usize]) -> Vec<usize> {
    let n = order.len();
    let mut current: Vec<usize> = (0..n).collect();
    let mut position: Vec<usize> = (0..n).collect();
    let mut ipiv = Vec::with_capacity(n);
    for (step, &source) in order.iter().enumerate() {
        let at = position[source];
        ipiv.push(at);
        if at != step {
            let displaced = current[step];
            current.swap(step, at);
            position[source] = step;
            position[displaced] = at;
        }
    }
    ipiv
}

pub(crate) struct SortedSvd<T: OracleScalar> {
    pub u: Option<DMatrix<T>>,
    pub s: Vec<f64>,
    pub v_t: Option<DMatrix<T>>,
}

/// Thin SVD with singular values sorted descending.
pub(crate) fn sorted_svd<T: OracleScalar>(
    matrix: DMatrix<T>,
    compute_vectors: bool,
) -> Result<SortedSvd<T>, LinAlgError> {
    let svd = SVD::new(matrix, compute_vectors, compute_vectors);
    let values: Vec<f64> = svd
        .singular_values
        .iter()
        .map(|value| T::real_to_f64(value.clone()))
        .collect();
    if values.iter().any(|value| !value.is_finite()) {
        return Err(LinAlgError::SvdNonConvergence);
    }

    let k = values.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&lhs, &rhs| values[rhs].total_cmp(&values[lhs]));
    let s = order.iter().map(|&idx| values[idx]).collect();

    if !compute_vectors {
        return Ok(SortedSvd { u: None, s, v_t: None });
    }
    let u = svd.u.ok_or(LinAlgError::SvdNonConvergence)?;
    let v_t = svd.v_t.ok_or(LinAlgError::SvdNonConvergence)?;
    let u = DMatrix::from_fn(u.nrows(), k, |row, col| u[(row, order[col])]);
    let v_t = DMatrix::from_fn(k, v_t.ncols(), |row, col| v_t[(order[row], col)]);
    Ok(SortedSvd {
        u: Some(u),
        s,
        v_t: Some(v_t),
    })
}

/// Extend orthonormal columns `basis` (`m × k`) to an `m × m` unitary matrix.
/// The appended columns come from a QR factorization of `[basis | I]`.
pub(crate) fn complete_basis<T: OracleScalar>(basis: &DMatrix<T>) -> DMatrix<T> {
    let m = basis.nrows();
    let k = basis.ncols();
    if k >= m {
        return basis.clone();
    }
    let mut augmented = DMatrix::<T>::zeros(m, k + m);
    augmented.columns_mut(0, k).copy_from(basis);
    augmented
        .columns_mut(k, m)
        .copy_from(&DMatrix::<T>::identity(m, m));
    let q = augmented.qr().q();

    let mut completed = DMatrix::<T>::zeros(m, m);
    completed.columns_mut(0, k).copy_from(basis);
    completed
        .columns_mut(k, m - k)
        .copy_from(&q.columns(k, m - k));
    completed
}
