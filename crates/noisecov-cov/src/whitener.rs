//! Whitening operators
//!
//! A whitening operator `W` for a noise covariance `C` satisfies
//! `W·C·Wᵀ = I`. It is built from the eigen-decomposition `C = V·D·Vᵀ` as
//! `W = D^{-1/2}·Vᵀ`, optionally truncated to the numerical rank.

use crate::error::{CovError, Result};
use crate::linalg::symmetric_eigen;
use derive_more::Display;
use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};

/// Sensor modality that is whitened as one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Modality {
    /// Magnetometers and gradiometers
    #[display("MEG")]
    Meg,
    /// Electric potential channels
    #[display("EEG")]
    Eeg,
}

/// Whitening operator for one modality block.
///
/// Eigenpairs are taken in descending order. With `use_pca` the operator
/// keeps only the first `rank` rows, giving a `rank × dim` matrix;
/// otherwise every eigenvalue is inverted and the result is `dim × dim`.
///
/// # Errors
/// [`CovError::IllConditioned`] if an eigenvalue that must be inverted is
/// not positive or is below `λ_max · f64::EPSILON`.
pub fn build_whitener(
    cov: &Array2<f64>,
    rank: usize,
    use_pca: bool,
    modality: Modality,
) -> Result<Array2<f64>> {
    let decomp = symmetric_eigen(cov)?;
    let dim = decomp.eigenvalues.len();

    let kept = if use_pca {
        log::info!("Setting small {modality} eigenvalues to zero.");
        rank.min(dim)
    } else {
        log::info!("Not doing PCA for {modality}.");
        dim
    };

    let largest = decomp.eigenvalues.first().copied().unwrap_or(0.0);
    let floor = largest * f64::EPSILON;
    let mut scale = Vec::with_capacity(kept);
    for &eigenvalue in decomp.eigenvalues.iter().take(kept) {
        if eigenvalue <= 0.0 || eigenvalue <= floor {
            return Err(CovError::IllConditioned {
                modality,
                eigenvalue,
            });
        }
        scale.push((1.0 / eigenvalue).sqrt());
    }

    let mut operator = decomp.eigenvectors.slice(s![.., ..kept]).t().to_owned();
    for (mut row, factor) in operator.rows_mut().into_iter().zip(scale) {
        row *= factor;
    }
    Ok(operator)
}

/// Direct sum of two operators: `[[a, 0], [0, b]]`.
pub fn block_diagonal(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let (ra, ca) = a.dim();
    let (rb, cb) = b.dim();
    let mut out = Array2::<f64>::zeros((ra + rb, ca + cb));
    out.slice_mut(s![..ra, ..ca]).assign(a);
    out.slice_mut(s![ra.., ca..]).assign(b);
    out
}

/// Combined whitener over MEG and EEG channels.
#[derive(Debug, Clone)]
pub struct Whitener {
    /// Operator matrix, `n_components × ch_names.len()`
    pub matrix: Array2<f64>,
    /// Input channel order: MEG channels followed by EEG channels
    pub ch_names: Vec<String>,
    /// Estimated rank of the MEG block, if MEG channels were selected
    pub meg_rank: Option<usize>,
    /// Estimated rank of the EEG block, if EEG channels were selected
    pub eeg_rank: Option<usize>,
}

impl Whitener {
    /// Number of output components.
    pub fn n_components(&self) -> usize {
        self.matrix.nrows()
    }

    /// Whiten a `channels × samples` block whose rows follow [`Self::ch_names`].
    pub fn apply(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.nrows() != self.ch_names.len() {
            return Err(CovError::DimensionMismatch {
                expected: self.ch_names.len(),
                actual: data.nrows(),
            });
        }
        Ok(self.matrix.dot(data))
    }

    /// Operator and channel order.
    pub fn into_parts(self) -> (Array2<f64>, Vec<String>) {
        (self.matrix, self.ch_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    fn assert_identity(matrix: &Array2<f64>, size: usize) {
        assert_eq!(matrix.dim(), (size, size));
        for ((i, j), &x) in matrix.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(x, expected, epsilon = 1e-9);
        }
    }

    fn correlated() -> Array2<f64> {
        Array2::from_shape_vec((3, 3), vec![4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0]).unwrap()
    }

    #[test]
    fn test_diagonal_no_pca_whitens_to_identity() {
        let cov = Array2::from_diag(&Array1::from_vec(vec![1e-26, 4e-26, 2.5e-25]));
        let w = build_whitener(&cov, 3, false, Modality::Meg).unwrap();
        assert_identity(&w.dot(&cov).dot(&w.t()), 3);
    }

    #[test]
    fn test_diagonal_pca_reduces_to_rank() {
        let cov = Array2::from_diag(&Array1::from_vec(vec![1.0, 4.0, 2.0, 0.5]));
        let w = build_whitener(&cov, 2, true, Modality::Eeg).unwrap();
        assert_eq!(w.dim(), (2, 4));
        assert_identity(&w.dot(&cov).dot(&w.t()), 2);
        // The two largest variances are kept
        assert_abs_diff_eq!(w[[0, 1]].abs(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w[[1, 2]].abs(), 1.0 / 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_correlated_full_rank() {
        let cov = correlated();
        let w = build_whitener(&cov, 3, true, Modality::Meg).unwrap();
        assert_identity(&w.dot(&cov).dot(&w.t()), 3);
    }

    #[test]
    fn test_rank_larger_than_dim_is_clamped() {
        let cov = correlated();
        let w = build_whitener(&cov, 10, true, Modality::Meg).unwrap();
        assert_eq!(w.nrows(), 3);
    }

    #[test]
    fn test_singular_without_pca_is_ill_conditioned() {
        let cov = Array2::from_diag(&Array1::from_vec(vec![1.0, 0.0]));
        let result = build_whitener(&cov, 1, false, Modality::Eeg);
        assert!(matches!(
            result,
            Err(CovError::IllConditioned {
                modality: Modality::Eeg,
                ..
            })
        ));

        // The PCA path drops the null direction
        let w = build_whitener(&cov, 1, true, Modality::Eeg).unwrap();
        assert_identity(&w.dot(&cov).dot(&w.t()), 1);
    }

    #[test]
    fn test_block_diagonal() {
        let a = Array2::from_elem((1, 2), 1.0);
        let b = Array2::from_elem((2, 1), 2.0);
        let out = block_diagonal(&a, &b);
        assert_eq!(out.dim(), (3, 3));
        assert_eq!(out[[0, 1]], 1.0);
        assert_eq!(out[[0, 2]], 0.0);
        assert_eq!(out[[2, 2]], 2.0);
        assert_eq!(out[[2, 0]], 0.0);
    }

    #[test]
    fn test_apply_checks_rows() {
        let whitener = Whitener {
            matrix: Array2::eye(2),
            ch_names: vec!["A".into(), "B".into()],
            meg_rank: Some(2),
            eeg_rank: None,
        };
        assert_eq!(whitener.n_components(), 2);
        assert!(whitener.apply(&Array2::zeros((3, 5))).is_err());
        let out = whitener.apply(&Array2::from_elem((2, 5), 3.0)).unwrap();
        assert_eq!(out.dim(), (2, 5));
    }

    #[test]
    fn test_modality_display() {
        assert_eq!(Modality::Meg.to_string(), "MEG");
        assert_eq!(Modality::Eeg.to_string(), "EEG");
    }
}
