//! Dense solves for the small Gram systems of the shape-space solvers.
//!
//! Gram matrices built from tangent vectors are symmetric positive
//! semi-definite. A Cholesky factorization is tried first; rank-deficient
//! systems fall back to an SVD least-squares solve.

use crate::{
    error::{ManifoldError, Result},
    types::{DMatrix, DVector, TensorView},
};

/// Relative cutoff for singular values in the least-squares fallback.
const SVD_RCOND: f64 = 1e-12;

/// Solves `matrix * x = rhs` for a symmetric positive semi-definite matrix.
pub fn solve_symmetric(matrix: &DMatrix, rhs: &DVector) -> Result<DVector> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
        return Err(ManifoldError::dimension_mismatch(
            format!("{}x{} system", rhs.len(), rhs.len()),
            format!("{}x{} matrix", matrix.nrows(), matrix.ncols()),
        ));
    }
    if matrix.nrows() == 0 {
        return Ok(DVector::zeros(0));
    }

    if let Some(cholesky) = matrix.clone().cholesky() {
        let solution = cholesky.solve(rhs);
        if solution.iter().all(|x| x.is_finite()) {
            return Ok(solution);
        }
    }

    let svd = matrix.clone().svd(true, true);
    let cutoff = SVD_RCOND * svd.singular_values.max();
    let solution = svd
        .solve(rhs, cutoff)
        .map_err(|reason| ManifoldError::numerical_error(format!("gram solve failed: {reason}")))?;
    if solution.iter().all(|x| x.is_finite()) {
        Ok(solution)
    } else {
        Err(ManifoldError::numerical_error(
            "gram solve produced non-finite coefficients",
        ))
    }
}

/// Orthogonal projection of `vector` onto the span of the columns of
/// `basis`, for the Euclidean inner product.
///
/// Returns the coefficients in the (not necessarily orthogonal) basis and
/// the projected vector.
pub fn project_onto_span(basis: &DMatrix, vector: &DVector) -> Result<(DVector, DVector)> {
    let gram = basis.transpose() * basis;
    let rhs = basis.transpose() * vector;
    let coefficients = solve_symmetric(&gram, &rhs)?;
    let projection = basis * &coefficients;
    Ok((coefficients, projection))
}

/// Flattens a tensor in row-major order.
pub fn to_dvector(tensor: &TensorView<'_>) -> DVector {
    DVector::from_iterator(tensor.len(), tensor.iter().copied())
}
