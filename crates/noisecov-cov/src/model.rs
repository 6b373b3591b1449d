//! Noise covariance model
//!
//! [`Covariance`] holds the matrix with its channel names and provenance
//! (degrees of freedom, a precomputed eigen-decomposition, projection
//! items and bad channels). It is immutable once built; whitening works
//! on derived copies.
//!
//! Deriving the whitener:
//! 1. keep the channels known to the measurement info and not marked bad
//! 2. apply the session's SSP projector, `P·C·Pᵀ`
//! 3. regularize each sensor group and separate MEG from EEG
//! 4. whiten each modality and stack the results block-diagonally

use crate::codec::{read_cov_file, write_cov_file};
use crate::config::WhitenerConfig;
use crate::error::{CovError, Result};
use crate::info::{MeasurementInfo, MegSelection};
use crate::kind::CovarianceKind;
use crate::linalg::{EigenDecomposition, asymmetry, submatrix, symmetrize};
use crate::proj::{Projection, make_projector};
use crate::regularize::{ModalityGroups, regularize};
use crate::whitener::{Modality, Whitener, block_diagonal, build_whitener};
use ndarray::{Array1, Array2};
use noisecov_fiff::SparseMatrix;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Degrees of freedom value meaning "unknown".
pub const NFREE_UNKNOWN: i64 = -1;

/// Largest relative asymmetry accepted for full and sparse values.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Covariance values in their storage layout.
#[derive(Debug, Clone, PartialEq)]
pub enum CovarianceData {
    /// Dense symmetric `dim × dim` matrix
    Full(Array2<f64>),
    /// Per-channel variances
    Diagonal(Array1<f64>),
    /// Sparse symmetric matrix
    Sparse(SparseMatrix),
}

impl CovarianceData {
    /// Number of channels.
    pub fn dim(&self) -> usize {
        match self {
            Self::Full(m) => m.nrows(),
            Self::Diagonal(v) => v.len(),
            Self::Sparse(s) => s.shape().0,
        }
    }

    /// Dense `dim × dim` copy.
    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            Self::Full(m) => m.clone(),
            Self::Diagonal(v) => Array2::from_diag(v),
            Self::Sparse(s) => s.to_dense(),
        }
    }

    fn check_square(&self) -> Result<()> {
        let (rows, cols) = match self {
            Self::Full(m) => m.dim(),
            Self::Diagonal(_) => return Ok(()),
            Self::Sparse(s) => s.shape(),
        };
        if rows == cols {
            Ok(())
        } else {
            Err(CovError::DimensionMismatch {
                expected: rows,
                actual: cols,
            })
        }
    }

    fn check_symmetric(&self) -> Result<()> {
        let asymmetry = match self {
            Self::Full(m) => asymmetry(m),
            Self::Diagonal(_) => return Ok(()),
            Self::Sparse(s) => asymmetry(&s.to_dense()),
        };
        if asymmetry <= SYMMETRY_TOLERANCE {
            Ok(())
        } else {
            Err(CovError::NotSymmetric { asymmetry })
        }
    }
}

/// A sensor noise covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance {
    kind: CovarianceKind,
    names: Vec<String>,
    data: CovarianceData,
    n_free: i64,
    eig: Option<EigenDecomposition>,
    projs: Vec<Projection>,
    bads: Vec<String>,
}

impl Covariance {
    /// Create a covariance.
    ///
    /// `names` must be unique, non-empty strings and either absent or one
    /// per row of `data`. Full and sparse values must be symmetric within
    /// [`SYMMETRY_TOLERANCE`] of their largest entry.
    pub fn new(kind: CovarianceKind, names: Vec<String>, data: CovarianceData) -> Result<Self> {
        data.check_square()?;
        data.check_symmetric()?;
        let dim = data.dim();
        if !names.is_empty() && names.len() != dim {
            return Err(CovError::NameCountMismatch {
                expected: dim,
                actual: names.len(),
            });
        }
        let mut seen = HashSet::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(CovError::EmptyChannelName(position));
            }
            if !seen.insert(name.as_str()) {
                return Err(CovError::DuplicateChannel(name.clone()));
            }
        }
        Ok(Self {
            kind,
            names,
            data,
            n_free: NFREE_UNKNOWN,
            eig: None,
            projs: Vec::new(),
            bads: Vec::new(),
        })
    }

    /// Set the degrees of freedom.
    pub const fn with_n_free(mut self, n_free: i64) -> Self {
        self.n_free = n_free;
        self
    }

    /// Attach a precomputed eigen-decomposition (eigenvectors as columns).
    pub fn with_eig(mut self, eig: EigenDecomposition) -> Result<Self> {
        let dim = self.dim();
        if eig.eigenvectors.nrows() != dim {
            return Err(CovError::DimensionMismatch {
                expected: dim,
                actual: eig.eigenvectors.nrows(),
            });
        }
        if eig.eigenvectors.ncols() != eig.eigenvalues.len() {
            return Err(CovError::DimensionMismatch {
                expected: eig.eigenvalues.len(),
                actual: eig.eigenvectors.ncols(),
            });
        }
        self.eig = Some(eig);
        Ok(self)
    }

    /// Attach projection items.
    pub fn with_projs(mut self, projs: Vec<Projection>) -> Self {
        self.projs = projs;
        self
    }

    /// Set the bad channel list.
    pub fn with_bads(mut self, bads: Vec<String>) -> Self {
        self.bads = bads;
        self
    }

    /// Covariance kind.
    pub const fn kind(&self) -> CovarianceKind {
        self.kind
    }

    /// Number of channels.
    pub fn dim(&self) -> usize {
        self.data.dim()
    }

    /// Channel names in row order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Covariance values.
    pub const fn data(&self) -> &CovarianceData {
        &self.data
    }

    /// Whether only per-channel variances are held.
    pub const fn is_diagonal(&self) -> bool {
        matches!(self.data, CovarianceData::Diagonal(_))
    }

    /// Degrees of freedom, [`NFREE_UNKNOWN`] if not known.
    pub const fn n_free(&self) -> i64 {
        self.n_free
    }

    /// Precomputed eigen-decomposition.
    pub const fn eig(&self) -> Option<&EigenDecomposition> {
        self.eig.as_ref()
    }

    /// Projection items stored with the covariance.
    pub fn projs(&self) -> &[Projection] {
        &self.projs
    }

    /// Bad channels stored with the covariance.
    pub fn bads(&self) -> &[String] {
        &self.bads
    }

    /// Read the covariance of kind `kind` ("full", "sparse" or "diagonal") from a file.
    pub fn load(path: impl AsRef<Path>, kind: &str) -> Result<Self> {
        let kind: CovarianceKind = kind.parse()?;
        read_cov_file(path, kind)
    }

    /// Write the covariance to a file, removing it again if writing fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_cov_file(path, self)
    }

    /// Build the whitener for the channels of `info`.
    ///
    /// The operator expects MEG channels followed by EEG channels, in the
    /// order of [`Whitener::ch_names`]. A diagonal covariance is always
    /// whitened without PCA.
    pub fn whitener(&self, info: &MeasurementInfo, config: &WhitenerConfig) -> Result<Whitener> {
        config.validate()?;

        let diagonal = self.kind == CovarianceKind::Diagonal || self.is_diagonal();
        let mut use_pca = config.use_pca;
        if use_pca && diagonal {
            log::warn!("Setting pca to false with a diagonal covariance matrix.");
            use_pca = false;
        }

        let selected: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, name)| info.contains(name) && !info.is_bad(name))
            .map(|(k, _)| k)
            .collect();
        if selected.is_empty() {
            return Err(CovError::NoChannelsSelected);
        }
        let ch_names: Vec<String> = selected.iter().map(|&k| self.names[k].clone()).collect();
        let mut noise = submatrix(&self.data.to_dense(), &selected);

        let projector = make_projector(info.projs(), &ch_names, &[])?;
        if projector.n_components > 0 {
            log::info!(
                "Created an SSP operator (subspace dimension = {})",
                projector.n_components
            );
            // P·C·Pᵀ is symmetric only up to rounding
            noise = symmetrize(&projector.matrix.dot(&noise).dot(&projector.matrix.t()));
        }

        let groups = modality_groups(info, &ch_names);
        if !groups.has_meg() && !groups.has_eeg() {
            return Err(CovError::NoChannelsSelected);
        }

        let regularized = regularize(&noise, diagonal, &groups, config)?;

        let w_meg = match regularized.meg_rank {
            Some(rank) => Some(build_whitener(
                &submatrix(&regularized.matrix, &groups.meg),
                rank,
                use_pca,
                Modality::Meg,
            )?),
            None => None,
        };
        let w_eeg = match regularized.eeg_rank {
            Some(rank) => Some(build_whitener(
                &submatrix(&regularized.matrix, &groups.eeg),
                rank,
                use_pca,
                Modality::Eeg,
            )?),
            None => None,
        };

        let matrix = match (w_meg, w_eeg) {
            (Some(meg), Some(eeg)) => block_diagonal(&meg, &eeg),
            (Some(w), None) | (None, Some(w)) => w,
            (None, None) => return Err(CovError::NoChannelsSelected),
        };

        let names = groups
            .meg
            .iter()
            .chain(&groups.eeg)
            .map(|&i| ch_names[i].clone())
            .collect();

        Ok(Whitener {
            matrix,
            ch_names: names,
            meg_rank: regularized.meg_rank,
            eeg_rank: regularized.eeg_rank,
        })
    }
}

/// Sensor groups of `ch_names`, in the acquisition order of `info`.
fn modality_groups(info: &MeasurementInfo, ch_names: &[String]) -> ModalityGroups {
    let position: HashMap<&str, usize> = ch_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let locate = |selection: MegSelection, eeg: bool| -> Vec<usize> {
        info.pick_names(selection, eeg, true)
            .iter()
            .filter_map(|name| {
                let found = position.get(name.as_str()).copied();
                if found.is_none() {
                    log::debug!("Channel {name} is not in the covariance, skipping");
                }
                found
            })
            .collect()
    };

    ModalityGroups {
        grad: locate(MegSelection::Gradiometers, false),
        mag: locate(MegSelection::Magnetometers, false),
        eeg: locate(MegSelection::None, true),
        meg: locate(MegSelection::All, false),
    }
}

impl fmt::Display for Covariance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = self.dim();
        write!(
            f,
            "Covariance (kind : {}, size : {dim} x {dim}, nfree : {})",
            self.kind, self.n_free
        )
    }
}
