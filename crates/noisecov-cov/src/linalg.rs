//! Dense linear algebra for covariance matrices
//!
//! Symmetric eigen-decomposition (cyclic Jacobi), singular values and
//! submatrix selection. All thresholds are relative to the matrix scale
//! because sensor covariances routinely have entries around 1e-26.

use crate::error::{CovError, Result};
use ndarray::{Array1, Array2, Axis};

/// Relative asymmetry below which a matrix is treated as symmetric.
pub const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Maximum number of Jacobi sweeps before giving up on convergence.
pub const DEFAULT_MAX_SWEEPS: usize = 100;

/// Off-diagonal Frobenius norm, relative to the full norm, at which the
/// iteration stops.
pub const DEFAULT_TOLERANCE: f64 = 1e-14;

/// Result of eigenvalue decomposition
#[derive(Debug, Clone, PartialEq)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

fn ensure_square(matrix: &Array2<f64>) -> Result<usize> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(CovError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    Ok(n)
}

/// Eigen-decomposition of a symmetric matrix with default settings.
///
/// The input is never modified; the iteration runs on a copy.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<EigenDecomposition> {
    jacobi_eigendecomp(matrix, DEFAULT_MAX_SWEEPS, DEFAULT_TOLERANCE)
}

/// Cyclic Jacobi eigenvalue decomposition for symmetric matrices
///
/// Each sweep rotates every off-diagonal pair once. Iteration stops when
/// the off-diagonal norm falls below `tolerance` times the Frobenius norm,
/// when a sweep performs no rotation, or after `max_sweeps` sweeps.
///
/// # Returns
/// * Eigenvalues in descending order with matching eigenvector columns
pub fn jacobi_eigendecomp(
    matrix: &Array2<f64>,
    max_sweeps: usize,
    tolerance: f64,
) -> Result<EigenDecomposition> {
    let n = ensure_square(matrix)?;

    let mut a = matrix.to_owned();
    let mut v = Array2::<f64>::eye(n);

    let scale = frobenius_norm(&a);
    if scale > 0.0 {
        let negligible = f64::EPSILON * 1e-2 * scale;
        for _sweep in 0..max_sweeps {
            if off_diagonal_norm(&a) <= tolerance * scale {
                break;
            }

            let mut rotated = false;
            for p in 0..n {
                for q in (p + 1)..n {
                    let apq = a[[p, q]];
                    if apq.abs() <= negligible {
                        continue;
                    }
                    let (cos_theta, sin_theta) = compute_rotation(a[[p, p]], a[[q, q]], apq);
                    apply_jacobi_rotation(&mut a, &mut v, p, q, cos_theta, sin_theta);
                    rotated = true;
                }
            }
            if !rotated {
                break;
            }
        }
    }

    let eigenvalues = a.diag().to_owned();

    // Sort eigenvalues and eigenvectors in descending order
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&i, &j| eigenvalues[j].total_cmp(&eigenvalues[i]));

    let sorted_eigenvalues = indices.iter().map(|&i| eigenvalues[i]).collect();
    let mut sorted_eigenvectors = Array2::<f64>::zeros((n, n));
    for (new_idx, &old_idx) in indices.iter().enumerate() {
        sorted_eigenvectors
            .column_mut(new_idx)
            .assign(&v.column(old_idx));
    }

    Ok(EigenDecomposition {
        eigenvalues: sorted_eigenvalues,
        eigenvectors: sorted_eigenvectors,
    })
}

fn frobenius_norm(matrix: &Array2<f64>) -> f64 {
    matrix.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

fn off_diagonal_norm(matrix: &Array2<f64>) -> f64 {
    let mut sum = 0.0;
    for ((i, j), &x) in matrix.indexed_iter() {
        if i != j {
            sum += x * x;
        }
    }
    sum.sqrt()
}

/// Compute the rotation (cos, sin) that zeroes `apq`
fn compute_rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    let tau = (aqq - app) / (2.0 * apq);
    let t = if tau.abs() > 1e150 {
        // tau^2 would overflow
        0.5 / tau
    } else if tau >= 0.0 {
        1.0 / (tau + (1.0 + tau * tau).sqrt())
    } else {
        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
    };

    let cos_theta = 1.0 / (1.0 + t * t).sqrt();
    let sin_theta = t * cos_theta;

    (cos_theta, sin_theta)
}

/// Apply a Jacobi rotation to matrix A and eigenvector matrix V
fn apply_jacobi_rotation(
    a: &mut Array2<f64>,
    v: &mut Array2<f64>,
    p: usize,
    q: usize,
    cos_theta: f64,
    sin_theta: f64,
) {
    let n = a.nrows();

    let app = a[[p, p]];
    let aqq = a[[q, q]];
    let apq = a[[p, q]];

    a[[p, p]] = cos_theta * cos_theta * app - 2.0 * cos_theta * sin_theta * apq
        + sin_theta * sin_theta * aqq;
    a[[q, q]] = sin_theta * sin_theta * app
        + 2.0 * cos_theta * sin_theta * apq
        + cos_theta * cos_theta * aqq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for i in 0..n {
        if i != p && i != q {
            let aip = a[[i, p]];
            let aiq = a[[i, q]];

            a[[i, p]] = cos_theta * aip - sin_theta * aiq;
            a[[p, i]] = a[[i, p]];

            a[[i, q]] = sin_theta * aip + cos_theta * aiq;
            a[[q, i]] = a[[i, q]];
        }
    }

    for i in 0..n {
        let vip = v[[i, p]];
        let viq = v[[i, q]];

        v[[i, p]] = cos_theta * vip - sin_theta * viq;
        v[[i, q]] = sin_theta * vip + cos_theta * viq;
    }
}

/// Singular values of a square matrix, in descending order.
///
/// Input symmetric within [`SYMMETRY_TOLERANCE`] uses the absolute
/// eigenvalues of its symmetric part; anything else goes through the
/// eigenvalues of `AᵀA`, which cannot resolve values below about
/// `1e-8 · s_max`.
pub fn singular_values(matrix: &Array2<f64>) -> Result<Array1<f64>> {
    ensure_square(matrix)?;

    let mut values: Vec<f64> = if is_symmetric(matrix, SYMMETRY_TOLERANCE) {
        symmetric_eigen(&symmetrize(matrix))?
            .eigenvalues
            .iter()
            .map(|v| v.abs())
            .collect()
    } else {
        let gram = matrix.t().dot(matrix);
        symmetric_eigen(&gram)?
            .eigenvalues
            .iter()
            .map(|v| v.max(0.0).sqrt())
            .collect()
    };
    values.sort_by(|a, b| b.total_cmp(a));
    Ok(Array1::from_vec(values))
}

/// Whether `matrix` is square and symmetric within `rel_tol` of its largest entry.
pub fn is_symmetric(matrix: &Array2<f64>, rel_tol: f64) -> bool {
    matrix.nrows() == matrix.ncols() && asymmetry(matrix) <= rel_tol
}

/// Largest `|A[i,j] - A[j,i]|` of a square matrix, relative to its largest entry.
pub fn asymmetry(matrix: &Array2<f64>) -> f64 {
    let max_abs = matrix.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if max_abs == 0.0 {
        return 0.0;
    }
    let n = matrix.nrows().min(matrix.ncols());
    let mut worst = 0.0_f64;
    for i in 0..n {
        for j in (i + 1)..n {
            worst = worst.max((matrix[[i, j]] - matrix[[j, i]]).abs());
        }
    }
    worst / max_abs
}

/// Symmetric part `(A + Aᵀ) / 2` of a square matrix.
pub fn symmetrize(matrix: &Array2<f64>) -> Array2<f64> {
    (matrix + &matrix.t()) * 0.5
}

/// Rows and columns `indices` of `matrix`, in the order given.
pub fn submatrix(matrix: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), indices).select(Axis(1), indices)
}
