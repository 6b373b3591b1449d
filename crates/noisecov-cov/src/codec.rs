//! Reading and writing covariance blocks
//!
//! A covariance block holds its kind, dimension, optional degrees of
//! freedom and channel names, then the values: a variance vector for a
//! diagonal covariance, the lower triangle packed row by row for a full
//! one, or a sparse matrix. An optional eigen-decomposition, projection
//! items and a nested bad-channel block follow.

use crate::error::{CovError, Result};
use crate::kind::CovarianceKind;
use crate::linalg::EigenDecomposition;
use crate::model::{Covariance, CovarianceData, NFREE_UNKNOWN};
use crate::proj::{read_proj, to_tag_int, write_proj};
use ndarray::{Array1, Array2};
use noisecov_fiff::constants::*;
use noisecov_fiff::{FiffWriter, Node};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read the first covariance of kind `kind` found under `node`.
pub fn read_cov(node: &Node, kind: CovarianceKind) -> Result<Covariance> {
    let covs = node.dir_tree_find(FIFFB_MNE_COV);
    if covs.is_empty() {
        return Err(CovError::NoCovariance);
    }

    for this in covs {
        let Some(tag) = this.find_tag(FIFF_MNE_COV_KIND) else {
            continue;
        };
        let Ok(id) = tag.as_int() else {
            log::debug!("Skipping covariance block with a non-integer kind tag");
            continue;
        };
        if id == kind.id() {
            return decode_block(this, kind);
        }
    }

    Err(CovError::NotFound(kind))
}

fn decode_block(this: &Node, kind: CovarianceKind) -> Result<Covariance> {
    let raw_dim = this
        .find_tag(FIFF_MNE_COV_DIM)
        .ok_or(CovError::MissingTag("Covariance matrix dimension"))?
        .as_int()?;
    let dim = usize::try_from(raw_dim).map_err(|_| {
        CovError::InvalidParameter(format!("negative covariance dimension {raw_dim}"))
    })?;

    let n_free = match this.find_tag(FIFF_MNE_COV_NFREE) {
        Some(tag) => i64::from(tag.as_int()?),
        None => NFREE_UNKNOWN,
    };

    let names = match this.find_tag(FIFF_MNE_ROW_NAMES) {
        Some(tag) => {
            let names = tag.as_name_list()?;
            if names.len() != dim {
                return Err(CovError::NameCountMismatch {
                    expected: dim,
                    actual: names.len(),
                });
            }
            names
        }
        None => Vec::new(),
    };

    let data = if let Some(tag) = this.find_tag(FIFF_MNE_COV) {
        if tag.is_sparse_matrix() {
            let sparse = tag.as_sparse()?;
            if sparse.shape() != (dim, dim) {
                return Err(CovError::DimensionMismatch {
                    expected: dim,
                    actual: sparse.shape().0,
                });
            }
            log::info!("{dim} x {dim} sparse covariance (kind = {}) found.", kind.id());
            CovarianceData::Sparse(sparse)
        } else {
            let packed = tag.as_doubles()?;
            log::info!("{dim} x {dim} full covariance (kind = {}) found.", kind.id());
            CovarianceData::Full(unpack_lower(&packed, dim)?)
        }
    } else if let Some(tag) = this.find_tag(FIFF_MNE_COV_DIAG) {
        let values = tag.as_doubles()?;
        if values.len() != dim {
            return Err(CovError::DimensionMismatch {
                expected: dim,
                actual: values.len(),
            });
        }
        log::info!("{dim} x {dim} diagonal covariance (kind = {}) found.", kind.id());
        CovarianceData::Diagonal(Array1::from_vec(values))
    } else {
        return Err(CovError::MissingTag("Covariance matrix data"));
    };

    let eig = match (
        this.find_tag(FIFF_MNE_COV_EIGENVALUES),
        this.find_tag(FIFF_MNE_COV_EIGENVECTORS),
    ) {
        (Some(values), Some(vectors)) => Some(EigenDecomposition {
            eigenvalues: Array1::from_vec(values.as_doubles()?),
            // Stored one eigenvector per row
            eigenvectors: vectors.as_matrix()?.reversed_axes(),
        }),
        _ => None,
    };

    let projs = read_proj(this)?;
    let bads = read_bad_channels(this)?;

    let mut cov = Covariance::new(kind, names, data)?
        .with_n_free(n_free)
        .with_projs(projs)
        .with_bads(bads);
    if let Some(eig) = eig {
        cov = cov.with_eig(eig)?;
    }
    Ok(cov)
}

/// Rebuild a symmetric matrix from its row-packed lower triangle.
fn unpack_lower(packed: &[f64], dim: usize) -> Result<Array2<f64>> {
    let expected = dim * (dim + 1) / 2;
    if packed.len() != expected {
        return Err(CovError::DimensionMismatch {
            expected,
            actual: packed.len(),
        });
    }
    let mut matrix = Array2::<f64>::zeros((dim, dim));
    let mut values = packed.iter();
    for i in 0..dim {
        for j in 0..=i {
            if let Some(&v) = values.next() {
                matrix[[i, j]] = v;
                matrix[[j, i]] = v;
            }
        }
    }
    Ok(matrix)
}

fn pack_lower(matrix: &Array2<f64>) -> Vec<f64> {
    let dim = matrix.nrows();
    let mut packed = Vec::with_capacity(dim * (dim + 1) / 2);
    for i in 0..dim {
        for j in 0..=i {
            packed.push(matrix[[i, j]]);
        }
    }
    packed
}

fn read_bad_channels(node: &Node) -> Result<Vec<String>> {
    let Some(block) = node.dir_tree_find(FIFFB_MNE_BAD_CHANNELS).into_iter().next() else {
        return Ok(Vec::new());
    };
    match block.find_tag(FIFF_MNE_CH_NAME_LIST) {
        Some(tag) => Ok(tag.as_name_list()?),
        None => Ok(Vec::new()),
    }
}

/// Write `cov` as a covariance block.
pub fn write_cov<W: Write>(writer: &mut FiffWriter<W>, cov: &Covariance) -> Result<()> {
    writer.start_block(FIFFB_MNE_COV)?;

    writer.write_int(FIFF_MNE_COV_KIND, cov.kind().id())?;
    writer.write_int(FIFF_MNE_COV_DIM, to_tag_int(cov.dim())?)?;
    if cov.n_free() > 0 {
        let n_free = i32::try_from(cov.n_free()).map_err(|_| {
            CovError::InvalidParameter(format!("{} does not fit a 32 bit tag", cov.n_free()))
        })?;
        writer.write_int(FIFF_MNE_COV_NFREE, n_free)?;
    }

    if !cov.names().is_empty() {
        writer.write_name_list(FIFF_MNE_ROW_NAMES, cov.names())?;
    }

    match cov.data() {
        CovarianceData::Diagonal(values) => {
            writer.write_double(FIFF_MNE_COV_DIAG, &values.to_vec())?;
        }
        CovarianceData::Full(matrix) => {
            writer.write_double(FIFF_MNE_COV, &pack_lower(matrix))?;
        }
        CovarianceData::Sparse(matrix) => writer.write_sparse_matrix(FIFF_MNE_COV, matrix)?,
    }

    if let Some(eig) = cov.eig() {
        writer.write_float_matrix(
            FIFF_MNE_COV_EIGENVECTORS,
            &eig.eigenvectors.t().to_owned(),
        )?;
        writer.write_double(FIFF_MNE_COV_EIGENVALUES, &eig.eigenvalues.to_vec())?;
    }

    write_proj(writer, cov.projs())?;

    if !cov.bads().is_empty() {
        writer.start_block(FIFFB_MNE_BAD_CHANNELS)?;
        writer.write_name_list(FIFF_MNE_CH_NAME_LIST, cov.bads())?;
        writer.end_block(FIFFB_MNE_BAD_CHANNELS)?;
    }

    writer.end_block(FIFFB_MNE_COV)?;
    Ok(())
}

/// Read the covariance of kind `kind` from a file.
pub fn read_cov_file(path: impl AsRef<Path>, kind: CovarianceKind) -> Result<Covariance> {
    let (_, tree) = noisecov_fiff::open(path)?;
    read_cov(&tree, kind)
}

/// Write `cov` to a new file.
///
/// If anything fails after the file was created it is removed before the
/// error is returned.
pub fn write_cov_file(path: impl AsRef<Path>, cov: &Covariance) -> Result<()> {
    let path = path.as_ref();
    let mut writer = FiffWriter::create(path)?;

    let outcome = match write_cov(&mut writer, cov) {
        Ok(()) => writer.finish().map(drop).map_err(CovError::from),
        Err(err) => {
            // The handle must be closed before the file can be removed
            drop(writer);
            Err(err)
        }
    };

    if let Err(err) = &outcome {
        log::warn!("Writing {} failed, removing it: {err}", path.display());
        if let Err(remove_err) = fs::remove_file(path) {
            log::error!("Could not remove {}: {remove_err}", path.display());
        }
    }
    outcome
}
