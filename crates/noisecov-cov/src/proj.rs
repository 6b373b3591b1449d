//! Signal-space projection (SSP) items
//!
//! A projection item holds vectors spanning an interference subspace,
//! defined on a list of channels. [`make_projector`] combines the active
//! items into the operator `I − U·Uᵀ` that removes that subspace.

use crate::error::{CovError, Result};
use crate::linalg::symmetric_eigen;
use ndarray::{Array2, s};
use noisecov_fiff::constants::*;
use noisecov_fiff::{FiffWriter, Node};
use std::collections::HashMap;
use std::io::Write;

/// Kind code of a field projection item.
pub const PROJ_ITEM_FIELD: i32 = 1;

/// Singular values at or below this fraction of the largest are treated as
/// linearly dependent when orthogonalizing projection vectors.
const DEPENDENT_VECTOR_RATIO: f64 = 1e-2;

/// A single projection item.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Human-readable description
    pub description: String,
    /// Item kind code (e.g. [`PROJ_ITEM_FIELD`])
    pub kind: i32,
    /// Whether the item takes part in projector construction
    pub active: bool,
    /// Channels the vectors are defined on
    pub ch_names: Vec<String>,
    /// Projection vectors, one per row (`nvec × ch_names.len()`)
    pub vectors: Array2<f64>,
}

impl Projection {
    /// Create a projection item, checking that vectors match the channel list.
    pub fn new(
        description: impl Into<String>,
        kind: i32,
        active: bool,
        ch_names: Vec<String>,
        vectors: Array2<f64>,
    ) -> Result<Self> {
        if vectors.ncols() != ch_names.len() {
            return Err(CovError::DimensionMismatch {
                expected: ch_names.len(),
                actual: vectors.ncols(),
            });
        }
        Ok(Self {
            description: description.into(),
            kind,
            active,
            ch_names,
            vectors,
        })
    }

    /// Number of projection vectors.
    pub fn nvec(&self) -> usize {
        self.vectors.nrows()
    }
}

/// Projection operator restricted to a channel ordering.
#[derive(Debug, Clone)]
pub struct Projector {
    /// `nchan × nchan` projection matrix
    pub matrix: Array2<f64>,
    /// Dimension of the removed subspace
    pub n_components: usize,
    /// Orthonormal basis of the removed subspace (`nchan × n_components`)
    pub basis: Array2<f64>,
}

impl Projector {
    fn identity(nchan: usize) -> Self {
        Self {
            matrix: Array2::eye(nchan),
            n_components: 0,
            basis: Array2::zeros((nchan, 0)),
        }
    }
}

/// Build the projector for `ch_names` from the active items of `projs`.
///
/// Entries on channels listed in `bads` are left out. Vectors are
/// normalized, re-orthogonalized and linearly dependent directions are
/// dropped before forming `I − U·Uᵀ`.
pub fn make_projector(projs: &[Projection], ch_names: &[String], bads: &[String]) -> Result<Projector> {
    let nchan = ch_names.len();
    if nchan == 0 {
        return Err(CovError::InvalidParameter(
            "No channel names specified".to_string(),
        ));
    }

    let active: Vec<&Projection> = projs.iter().filter(|p| p.active).collect();
    let total_vectors: usize = active.iter().map(|p| p.nvec()).sum();
    if total_vectors == 0 {
        return Ok(Projector::identity(nchan));
    }

    let mut vecs = Array2::<f64>::zeros((nchan, total_vectors));
    let mut column = 0;
    let mut nonzero = 0;

    for (k, proj) in active.iter().enumerate() {
        let mut positions = HashMap::with_capacity(proj.ch_names.len());
        for (c, name) in proj.ch_names.iter().enumerate() {
            if positions.insert(name.as_str(), c).is_some() {
                return Err(CovError::DuplicateChannel(format!(
                    "{name} (projection item {k})"
                )));
            }
        }

        // Pairs of (row in output, column in projection vectors)
        let picks: Vec<(usize, usize)> = ch_names
            .iter()
            .enumerate()
            .filter(|(_, name)| !bads.contains(*name))
            .filter_map(|(c, name)| positions.get(name.as_str()).map(|&v| (c, v)))
            .collect();

        for v in 0..proj.nvec() {
            for &(c, src) in &picks {
                vecs[[c, column + v]] = proj.vectors[[v, src]];
            }
            let norm = vecs.column(column + v).dot(&vecs.column(column + v)).sqrt();
            if norm > 0.0 {
                vecs.column_mut(column + v).mapv_inplace(|x| x / norm);
                nonzero += 1;
            }
        }
        column += proj.nvec();
    }

    if nonzero == 0 {
        return Ok(Projector::identity(nchan));
    }

    // Left singular vectors of `vecs` are the eigenvectors of vecs·vecsᵀ,
    // with eigenvalues equal to the squared singular values.
    let decomp = symmetric_eigen(&vecs.dot(&vecs.t()))?;
    let largest = decomp.eigenvalues[0];
    let n_components = decomp
        .eigenvalues
        .iter()
        .take(total_vectors)
        .filter(|&&e| e > largest * DEPENDENT_VECTOR_RATIO * DEPENDENT_VECTOR_RATIO)
        .count();

    let basis = decomp.eigenvectors.slice(s![.., ..n_components]).to_owned();
    let matrix = Array2::<f64>::eye(nchan) - basis.dot(&basis.t());

    Ok(Projector {
        matrix,
        n_components,
        basis,
    })
}

/// Read the projection items stored under `node`.
///
/// Returns an empty list when there is no projection block.
pub fn read_proj(node: &Node) -> Result<Vec<Projection>> {
    let Some(block) = node.dir_tree_find(FIFFB_PROJ).into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut projs = Vec::new();
    for item in block.dir_tree_find(FIFFB_PROJ_ITEM) {
        let description = match item
            .find_tag(FIFF_NAME)
            .or_else(|| item.find_tag(FIFF_DESCRIPTION))
        {
            Some(tag) => tag.as_string()?,
            None => String::new(),
        };

        let kind = item
            .find_tag(FIFF_PROJ_ITEM_KIND)
            .ok_or(CovError::MissingTag("Projection item kind"))?
            .as_int()?;
        let nchan = item
            .find_tag(FIFF_NCHAN)
            .ok_or(CovError::MissingTag("Number of channels in projection item"))?
            .as_int()?;
        let ch_names = item
            .find_tag(FIFF_PROJ_ITEM_CH_NAME_LIST)
            .ok_or(CovError::MissingTag("Projection item channel list"))?
            .as_name_list()?;
        let active = match item.find_tag(FIFF_MNE_PROJ_ITEM_ACTIVE) {
            Some(tag) => tag.as_int()? != 0,
            None => false,
        };
        let vectors = item
            .find_tag(FIFF_PROJ_ITEM_VECTORS)
            .ok_or(CovError::MissingTag("Projection item vectors"))?
            .as_matrix()?;

        if usize::try_from(nchan).ok() != Some(ch_names.len()) {
            return Err(CovError::NameCountMismatch {
                expected: usize::try_from(nchan).unwrap_or_default(),
                actual: ch_names.len(),
            });
        }
        if let Some(tag) = item.find_tag(FIFF_PROJ_ITEM_NVEC) {
            let nvec = tag.as_int()?;
            if usize::try_from(nvec).ok() != Some(vectors.nrows()) {
                return Err(CovError::DimensionMismatch {
                    expected: usize::try_from(nvec).unwrap_or_default(),
                    actual: vectors.nrows(),
                });
            }
        }

        projs.push(Projection::new(description, kind, active, ch_names, vectors)?);
    }

    log::debug!("Read {} projection item(s)", projs.len());
    Ok(projs)
}

/// Write a projection block holding `projs`; nothing is written for an empty list.
pub fn write_proj<W: Write>(writer: &mut FiffWriter<W>, projs: &[Projection]) -> Result<()> {
    if projs.is_empty() {
        return Ok(());
    }

    writer.start_block(FIFFB_PROJ)?;
    for proj in projs {
        writer.start_block(FIFFB_PROJ_ITEM)?;
        writer.write_string(FIFF_NAME, &proj.description)?;
        writer.write_int(FIFF_PROJ_ITEM_KIND, proj.kind)?;
        if proj.kind == PROJ_ITEM_FIELD {
            writer.write_float(FIFF_PROJ_ITEM_TIME, 0.0)?;
        }
        writer.write_int(FIFF_NCHAN, to_tag_int(proj.ch_names.len())?)?;
        writer.write_int(FIFF_PROJ_ITEM_NVEC, to_tag_int(proj.nvec())?)?;
        writer.write_int(FIFF_MNE_PROJ_ITEM_ACTIVE, i32::from(proj.active))?;
        writer.write_name_list(FIFF_PROJ_ITEM_CH_NAME_LIST, &proj.ch_names)?;
        writer.write_float_matrix(FIFF_PROJ_ITEM_VECTORS, &proj.vectors)?;
        writer.end_block(FIFFB_PROJ_ITEM)?;
    }
    writer.end_block(FIFFB_PROJ)?;
    Ok(())
}

pub(crate) fn to_tag_int(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| CovError::InvalidParameter(format!("{value} does not fit a 32 bit tag")))
}
