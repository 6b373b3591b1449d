//! Compressed sparse matrices as stored in sparse matrix tags.

use crate::error::{FiffError, Result};
use ndarray::Array2;

/// Storage order of a compressed sparse matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseFormat {
    /// Compressed column storage: `indptr` runs over columns, `indices` are rows.
    Ccs,
    /// Compressed row storage: `indptr` runs over rows, `indices` are columns.
    Rcs,
}

/// A compressed sparse matrix of doubles.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    format: SparseFormat,
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
    indices: Vec<usize>,
    indptr: Vec<usize>,
}

impl SparseMatrix {
    /// Build a sparse matrix from its compressed parts, validating the index structure.
    pub fn new(
        format: SparseFormat,
        shape: (usize, usize),
        data: Vec<f64>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
    ) -> Result<Self> {
        let (nrows, ncols) = shape;
        let (major, minor) = match format {
            SparseFormat::Ccs => (ncols, nrows),
            SparseFormat::Rcs => (nrows, ncols),
        };

        if data.len() != indices.len() {
            return Err(FiffError::InvalidSparse(format!(
                "{} values but {} indices",
                data.len(),
                indices.len()
            )));
        }
        if indptr.len() != major + 1 {
            return Err(FiffError::InvalidSparse(format!(
                "pointer array has {} entries, expected {}",
                indptr.len(),
                major + 1
            )));
        }
        if indptr.first() != Some(&0) || indptr.last() != Some(&data.len()) {
            return Err(FiffError::InvalidSparse(
                "pointer array must start at 0 and end at nnz".to_string(),
            ));
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(FiffError::InvalidSparse(
                "pointer array is not monotone".to_string(),
            ));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= minor) {
            return Err(FiffError::InvalidSparse(format!(
                "index {bad} out of bounds for dimension {minor}"
            )));
        }

        Ok(Self {
            format,
            nrows,
            ncols,
            data,
            indices,
            indptr,
        })
    }

    /// Compress the nonzero entries of a dense matrix in row order.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (nrows, ncols) = dense.dim();
        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(nrows + 1);
        indptr.push(0);

        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    data.push(v);
                    indices.push(j);
                }
            }
            indptr.push(data.len());
        }

        Self {
            format: SparseFormat::Rcs,
            nrows,
            ncols,
            data,
            indices,
            indptr,
        }
    }

    /// Expand into a dense matrix.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::<f64>::zeros((self.nrows, self.ncols));
        for (major, bounds) in self.indptr.windows(2).enumerate() {
            for k in bounds[0]..bounds[1] {
                let minor = self.indices[k];
                let (i, j) = match self.format {
                    SparseFormat::Ccs => (minor, major),
                    SparseFormat::Rcs => (major, minor),
                };
                dense[[i, j]] += self.data[k];
            }
        }
        dense
    }

    /// Storage order.
    pub const fn format(&self) -> SparseFormat {
        self.format
    }

    /// `(rows, columns)`.
    pub const fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Stored values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Minor-axis index of each stored value.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Offsets into `data` for each major-axis line.
    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }
}
