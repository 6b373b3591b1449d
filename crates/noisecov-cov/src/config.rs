//! Configuration for whitening and streaming estimation.

use crate::error::{CovError, Result};
use crate::kind::CovarianceKind;
use crate::rank::DEFAULT_RANK_TOL;
use serde::{Deserialize, Serialize};

/// Whitener configuration
///
/// Regularization factors are fractions of the mean variance of each
/// sensor group that get added to its diagonal. Values between 0.05 and
/// 0.2 are typical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitenerConfig {
    /// Regularization of the magnetometers (default: 0.1)
    pub mag_reg: f64,

    /// Regularization of the gradiometers (default: 0.1)
    pub grad_reg: f64,

    /// Regularization of the EEG channels (default: 0.1)
    pub eeg_reg: f64,

    /// Restrict whitening to the numerical rank of each modality (default: true)
    ///
    /// Useful when the data are rank deficient after SSP or
    /// signal-space separation.
    pub use_pca: bool,

    /// Relative singular value tolerance for rank estimation (default: 1e-8)
    pub rank_tol: f64,
}

impl Default for WhitenerConfig {
    fn default() -> Self {
        Self {
            mag_reg: 0.1,
            grad_reg: 0.1,
            eeg_reg: 0.1,
            use_pca: true,
            rank_tol: DEFAULT_RANK_TOL,
        }
    }
}

impl WhitenerConfig {
    /// Check that all factors are finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("mag_reg", self.mag_reg),
            ("grad_reg", self.grad_reg),
            ("eeg_reg", self.eeg_reg),
            ("rank_tol", self.rank_tol),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CovError::InvalidParameter(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Streaming estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// What to accumulate: full matrix or per-channel variances (default: full)
    pub kind: CovarianceKind,

    /// Length of each chunk read from the source, in seconds (default: 10)
    pub chunk_duration: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            kind: CovarianceKind::Full,
            chunk_duration: 10.0,
        }
    }
}
