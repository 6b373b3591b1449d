//! Numerical rank estimation.

use crate::error::Result;
use crate::linalg::singular_values;
use ndarray::Array2;

/// Default relative tolerance for [`rank`].
pub const DEFAULT_RANK_TOL: f64 = 1e-8;

/// Effective rank of a square matrix.
///
/// Counts singular values strictly greater than `tol` times the largest
/// one, so an all-zero matrix has rank 0. The input is not modified.
pub fn rank(matrix: &Array2<f64>, tol: f64) -> Result<usize> {
    let s = singular_values(matrix)?;
    let Some(&s_max) = s.first() else {
        return Ok(0);
    };
    let threshold = s_max * tol;
    Ok(s.iter().filter(|&&v| v > threshold).count())
}
