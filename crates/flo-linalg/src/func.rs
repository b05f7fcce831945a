//! NumPy/SciPy function conventions layered on the driver routines.

use crate::backend::{
    PackedLu, cholesky_lower, complete_basis, from_dmatrix, from_f64, full_from_triangle,
    modulus_of, sorted_svd, to_dmatrix,
};
use crate::driver::{EighOutput, gesv, getrf, getri, syevd, sygvd, sysv};
use crate::{
    DenseMatrix, EighItype, LinAlgError, OracleScalar, SvdMode, SymmetryKind, UpLo,
    validate_rhs_rows, validate_square,
};
use nalgebra::DMatrix;

#[derive(Debug, Clone, PartialEq)]
pub struct SvdOutput<T> {
    pub u: Option<DenseMatrix<T>>,
    /// Descending, widened to `f64`.
    pub s: Vec<f64>,
    pub vt: Option<DenseMatrix<T>>,
}

/// Cleaned Cholesky factor: `L` with `L Lᴴ = B`, or `U` with `Uᴴ U = B`.
pub fn cholesky<T: OracleScalar>(b: &DenseMatrix<T>, uplo: UpLo) -> Result<DenseMatrix<T>, LinAlgError> {
    validate_square(b)?;
    let l = cholesky_lower(full_from_triangle(&to_dmatrix(b), uplo, SymmetryKind::Hermitian))?;
    let factor = match uplo {
        UpLo::Lower => l,
        UpLo::Upper => l.adjoint(),
    };
    Ok(from_dmatrix(&factor))
}

pub fn eigh<T: OracleScalar>(a: &DenseMatrix<T>, uplo: UpLo) -> Result<EighOutput<T>, LinAlgError> {
    syevd(a, uplo)
}

pub fn eigh_generalized<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
    uplo: UpLo,
    itype: EighItype,
) -> Result<EighOutput<T>, LinAlgError> {
    sygvd(a, b, uplo, itype)
}

pub fn inv<T: OracleScalar>(a: &DenseMatrix<T>) -> Result<DenseMatrix<T>, LinAlgError> {
    let factored = getrf(a)?;
    getri(&factored.lu, &factored.ipiv)
}

/// `b` may be a single column for vector right-hand sides.
pub fn solve_general<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
) -> Result<DenseMatrix<T>, LinAlgError> {
    Ok(gesv(a, b)?.x)
}

pub fn solve_symmetric<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
    uplo: UpLo,
    kind: SymmetryKind,
) -> Result<DenseMatrix<T>, LinAlgError> {
    sysv(a, b, uplo, kind)
}

/// Solve with the triangle of `a` selected by `uplo`; the other triangle is
/// treated as zero.
pub fn solve_triangular<T: OracleScalar>(
    a: &DenseMatrix<T>,
    b: &DenseMatrix<T>,
    uplo: UpLo,
) -> Result<DenseMatrix<T>, LinAlgError> {
    validate_rhs_rows(a, b)?;
    let coefficients = to_dmatrix(a);
    let rhs = to_dmatrix(b);
    let solved = match uplo {
        UpLo::Lower => coefficients.solve_lower_triangular(&rhs),
        UpLo::Upper => coefficients.solve_upper_triangular(&rhs),
    };
    solved
        .map(|x| from_dmatrix(&x))
        .ok_or(LinAlgError::SolverSingularity)
}

/// `(sign, log|det|)`; singular input gives `(0, -inf)`.
pub fn slogdet<T: OracleScalar>(a: &DenseMatrix<T>) -> Result<(T, f64), LinAlgError> {
    let n = validate_square(a)?;
    let lu = PackedLu::factor(to_dmatrix(a));
    let mut sign: T = if lu.swap_count() % 2 == 1 {
        from_f64(-1.0)
    } else {
        nalgebra::one()
    };
    let mut logabsdet = 0.0f64;
    for idx in 0..n {
        let pivot = lu.packed[(idx, idx)];
        let magnitude = modulus_of(pivot);
        if magnitude == 0.0 {
            return Ok((nalgebra::zero(), f64::NEG_INFINITY));
        }
        sign *= pivot / from_f64::<T>(magnitude);
        logabsdet += magnitude.ln();
    }
    Ok((sign, logabsdet))
}

pub fn det<T: OracleScalar>(a: &DenseMatrix<T>) -> Result<T, LinAlgError> {
    let n = validate_square(a)?;
    let lu = PackedLu::factor(to_dmatrix(a));
    let mut value: T = if lu.swap_count() % 2 == 1 {
        from_f64(-1.0)
    } else {
        nalgebra::one()
    };
    for idx in 0..n {
        value *= lu.packed[(idx, idx)];
    }
    Ok(value)
}

/// Singular value decomposition `A = U diag(s) Vᴴ`. `Full` completes `U`
/// and `Vᴴ` to square unitary matrices.
pub fn svd<T: OracleScalar>(a: &DenseMatrix<T>, mode: SvdMode) -> Result<SvdOutput<T>, LinAlgError> {
    let decomposed = sorted_svd(to_dmatrix(a), mode != SvdMode::ValuesOnly)?;
    let (u, vt) = match (mode, decomposed.u, decomposed.v_t) {
        (SvdMode::ValuesOnly, _, _) => (None, None),
        (SvdMode::Thin, Some(u), Some(v_t)) => (Some(u), Some(v_t)),
        (SvdMode::Full, Some(u), Some(v_t)) => {
            let u = complete_basis(&u);
            let v_t = complete_basis(&v_t.adjoint()).adjoint();
            (Some(u), Some(v_t))
        }
        _ => return Err(LinAlgError::SvdNonConvergence),
    };
    Ok(SvdOutput {
        u: u.as_ref().map(from_dmatrix),
        s: decomposed.s,
        vt: vt.as_ref().map(from_dmatrix),
    })
}

/// Moore-Penrose pseudo-inverse and its rank. Singular values strictly
/// above `atol + rtol * s_max` are kept.
pub fn pinv<T: OracleScalar>(
    a: &DenseMatrix<T>,
    atol: f64,
    rtol: f64,
) -> Result<(DenseMatrix<T>, usize), LinAlgError> {
    if !atol.is_finite() || !rtol.is_finite() || atol < 0.0 || rtol < 0.0 {
        return Err(LinAlgError::TolerancePolicyViolation(
            "pinv tolerances must be finite and non-negative",
        ));
    }
    let decomposed = sorted_svd(to_dmatrix(a), true)?;
    let (Some(u), Some(v_t)) = (decomposed.u, decomposed.v_t) else {
        return Err(LinAlgError::SvdNonConvergence);
    };
    let s_max = decomposed.s.first().copied().unwrap_or(0.0);
    let cutoff = atol + rtol * s_max;
    let rank = decomposed.s.iter().take_while(|&&value| value > cutoff).count();

    let (m, n) = (a.rows(), a.cols());
    if rank == 0 {
        return Ok((from_dmatrix(&DMatrix::<T>::zeros(n, m)), 0));
    }
    let scaled_u = DMatrix::from_fn(m, rank, |row, col| {
        u[(row, col)] * from_f64::<T>(1.0 / decomposed.s[col])
    });
    let kept_v_t = v_t.rows(0, rank).into_owned();
    let pseudo = kept_v_t.adjoint() * scaled_u.adjoint();
    Ok((from_dmatrix(&pseudo), rank))
}

/// `V diag(values) Vᴴ` for eigenvector columns `V`.
pub fn spectral_reconstruct<T: OracleScalar>(
    vectors: &DenseMatrix<T>,
    values: &[f64],
) -> Result<DenseMatrix<T>, LinAlgError> {
    let n = validate_square(vectors)?;
    if values.len() != n {
        return Err(LinAlgError::ShapeContractViolation(
            "spectrum length must equal eigenvector count",
        ));
    }
    let v = to_dmatrix(vectors);
    let scaled = DMatrix::from_fn(n, n, |row, col| v[(row, col)] * from_f64::<T>(values[col]));
    Ok(from_dmatrix(&(scaled * v.adjoint())))
}
