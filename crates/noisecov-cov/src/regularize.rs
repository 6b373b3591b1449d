//! Diagonal loading and modality separation of a noise covariance.

use crate::config::WhitenerConfig;
use crate::error::Result;
use crate::linalg::submatrix;
use crate::rank::rank;
use ndarray::Array2;

/// Channel indices of each sensor group, relative to the covariance rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalityGroups {
    /// Gradiometers
    pub grad: Vec<usize>,
    /// Magnetometers
    pub mag: Vec<usize>,
    /// EEG channels
    pub eeg: Vec<usize>,
    /// All MEG channels in acquisition order
    pub meg: Vec<usize>,
}

impl ModalityGroups {
    /// Whether any MEG channel is present.
    pub fn has_meg(&self) -> bool {
        !self.meg.is_empty()
    }

    /// Whether any EEG channel is present.
    pub fn has_eeg(&self) -> bool {
        !self.eeg.is_empty()
    }
}

/// Working covariance ready for whitening.
#[derive(Debug, Clone)]
pub struct RegularizedCovariance {
    /// Loaded copy of the input covariance
    pub matrix: Array2<f64>,
    /// Rank of the MEG block, if MEG channels are present
    pub meg_rank: Option<usize>,
    /// Rank of the EEG block, if EEG channels are present
    pub eeg_rank: Option<usize>,
}

/// Regularize a copy of `cov`.
///
/// For a diagonal covariance only the variances are kept and each block
/// has full rank. Otherwise the MEG and EEG ranks are estimated on the
/// unregularized blocks, then every group gets `factor · mean(variance)`
/// added to its diagonal and the MEG/EEG cross terms are zeroed.
pub fn regularize(
    cov: &Array2<f64>,
    is_diagonal: bool,
    groups: &ModalityGroups,
    config: &WhitenerConfig,
) -> Result<RegularizedCovariance> {
    let variances = cov.diag().to_owned();

    if is_diagonal {
        log::info!("Rank of noise covariance is {}", variances.len());
        return Ok(RegularizedCovariance {
            matrix: Array2::from_diag(&variances),
            meg_rank: groups.has_meg().then_some(groups.meg.len()),
            eeg_rank: groups.has_eeg().then_some(groups.eeg.len()),
        });
    }

    let meg_rank = if groups.has_meg() {
        let r = rank(&submatrix(cov, &groups.meg), config.rank_tol)?;
        log::info!("Rank of MEG part of noise covariance is {r}");
        Some(r)
    } else {
        None
    };
    let eeg_rank = if groups.has_eeg() {
        let r = rank(&submatrix(cov, &groups.eeg), config.rank_tol)?;
        log::info!("Rank of EEG part of noise covariance is {r}");
        Some(r)
    } else {
        None
    };

    let mut matrix = cov.to_owned();
    for (indices, factor) in [
        (&groups.grad, config.grad_reg),
        (&groups.mag, config.mag_reg),
        (&groups.eeg, config.eeg_reg),
    ] {
        if indices.is_empty() {
            continue;
        }
        let mean = indices.iter().map(|&i| variances[i]).sum::<f64>() / indices.len() as f64;
        let load = factor * mean;
        for &i in indices {
            matrix[[i, i]] += load;
        }
    }

    if groups.has_meg() && groups.has_eeg() {
        for &i in &groups.meg {
            for &j in &groups.eeg {
                matrix[[i, j]] = 0.0;
                matrix[[j, i]] = 0.0;
            }
        }
    }

    Ok(RegularizedCovariance {
        matrix,
        meg_rank,
        eeg_rank,
    })
}
