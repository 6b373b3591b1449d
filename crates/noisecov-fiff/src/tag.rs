//! Tags and typed access to their payloads.

use crate::constants::*;
use crate::error::{FiffError, Result};
use crate::sparse::{SparseFormat, SparseMatrix};
use chrono::{DateTime, Utc};
use ndarray::Array2;

/// A single tag: header fields plus the raw big-endian payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// What the tag means (e.g. [`FIFF_MNE_COV_DIM`])
    pub kind: i32,
    /// Data type code of the payload (e.g. [`FIFFT_INT`])
    pub ty: i32,
    /// Chaining field, [`FIFFV_NEXT_SEQ`] for sequential files
    pub next: i32,
    /// Payload bytes
    pub data: Vec<u8>,
}

/// Contents of the file id tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileId {
    /// Format version, major in the high 16 bits
    pub version: i32,
    /// Machine identifier
    pub machid: [i32; 2],
    /// Creation time
    pub time: DateTime<Utc>,
}

impl FileId {
    /// A file id stamped with the current time.
    pub fn now() -> Self {
        Self {
            version: FIFFC_VERSION,
            machid: [0, 0],
            time: Utc::now(),
        }
    }

    pub(crate) fn to_bytes(self) -> Vec<u8> {
        let secs = self.time.timestamp() as i32;
        let usecs = self.time.timestamp_subsec_micros() as i32;
        [self.version, self.machid[0], self.machid[1], secs, usecs]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect()
    }
}

pub(crate) fn be_i32(bytes: &[u8]) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[..4]);
    i32::from_be_bytes(b)
}

fn be_f32(bytes: &[u8]) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[..4]);
    f32::from_be_bytes(b)
}

fn be_f64(bytes: &[u8]) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[..8]);
    f64::from_be_bytes(b)
}

impl Tag {
    /// Create a tag that follows its predecessor sequentially.
    pub const fn new(kind: i32, ty: i32, data: Vec<u8>) -> Self {
        Self {
            kind,
            ty,
            next: FIFFV_NEXT_SEQ,
            data,
        }
    }

    const fn mismatch(&self, expected: &'static str) -> FiffError {
        FiffError::TypeMismatch {
            kind: self.kind,
            expected,
            actual: self.ty,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> FiffError {
        FiffError::Malformed {
            kind: self.kind,
            reason: reason.into(),
        }
    }

    /// Whether the payload is a matrix of any coding.
    pub const fn is_matrix(&self) -> bool {
        self.ty & FIFFT_MATRIX != 0
    }

    /// Whether the payload is a compressed sparse matrix.
    pub const fn is_sparse_matrix(&self) -> bool {
        self.is_matrix() && self.ty & (FIFFTS_MC_CCS | FIFFTS_MC_RCS) != 0
    }

    /// First integer of an int tag.
    pub fn as_int(&self) -> Result<i32> {
        self.as_ints()?
            .first()
            .copied()
            .ok_or_else(|| self.malformed("empty int tag"))
    }

    /// All integers of an int tag.
    pub fn as_ints(&self) -> Result<Vec<i32>> {
        if self.ty != FIFFT_INT {
            return Err(self.mismatch("int"));
        }
        if self.data.len() % 4 != 0 {
            return Err(self.malformed("size is not a multiple of 4"));
        }
        Ok(self.data.chunks_exact(4).map(be_i32).collect())
    }

    /// Values of a float or double array tag, widened to `f64`.
    pub fn as_doubles(&self) -> Result<Vec<f64>> {
        match self.ty {
            FIFFT_DOUBLE => {
                if self.data.len() % 8 != 0 {
                    return Err(self.malformed("size is not a multiple of 8"));
                }
                Ok(self.data.chunks_exact(8).map(be_f64).collect())
            }
            FIFFT_FLOAT => {
                if self.data.len() % 4 != 0 {
                    return Err(self.malformed("size is not a multiple of 4"));
                }
                Ok(self
                    .data
                    .chunks_exact(4)
                    .map(|c| f64::from(be_f32(c)))
                    .collect())
            }
            _ => Err(self.mismatch("float or double")),
        }
    }

    /// Payload of a string tag.
    pub fn as_string(&self) -> Result<String> {
        if self.ty != FIFFT_STRING {
            return Err(self.mismatch("string"));
        }
        Ok(String::from_utf8_lossy(&self.data).into_owned())
    }

    /// Colon-separated name list; an empty string is an empty list.
    pub fn as_name_list(&self) -> Result<Vec<String>> {
        let joined = self.as_string()?;
        if joined.is_empty() {
            return Ok(Vec::new());
        }
        Ok(joined.split(':').map(str::to_string).collect())
    }

    /// Payload of the file id tag.
    pub fn as_file_id(&self) -> Result<FileId> {
        if self.ty != FIFFT_ID_STRUCT {
            return Err(self.mismatch("id struct"));
        }
        if self.data.len() < 20 {
            return Err(self.malformed("file id shorter than 20 bytes"));
        }
        let v: Vec<i32> = self.data[..20].chunks_exact(4).map(be_i32).collect();
        let nanos = (v[4].max(0) as u32)
            .checked_mul(1000)
            .ok_or_else(|| self.malformed(format!("microseconds field {} out of range", v[4])))?;
        let time = DateTime::from_timestamp(i64::from(v[3]), nanos)
            .ok_or_else(|| self.malformed("invalid timestamp"))?;
        Ok(FileId {
            version: v[0],
            machid: [v[1], v[2]],
            time,
        })
    }

    /// Trailing dimension block of a matrix payload: `(dims, bytes used by dims)`.
    fn matrix_dims(&self, extra: usize) -> Result<(Vec<usize>, usize)> {
        let len = self.data.len();
        if len < 4 {
            return Err(self.malformed("matrix payload lacks dimensions"));
        }
        let ndim = be_i32(&self.data[len - 4..]);
        if ndim != 2 {
            return Err(self.malformed(format!("only 2-D matrices are supported, got {ndim}")));
        }
        let count = ndim as usize + extra;
        let used = 4 * (count + 1);
        if len < used {
            return Err(self.malformed("matrix payload lacks dimensions"));
        }
        let dims = self.data[len - used..len - 4]
            .chunks_exact(4)
            .map(|c| {
                let v = be_i32(c);
                usize::try_from(v).map_err(|_| self.malformed(format!("negative dimension {v}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((dims, used))
    }

    fn element_size(&self) -> Result<usize> {
        match self.ty & FIFFTS_FS_MASK {
            FIFFT_FLOAT => Ok(4),
            FIFFT_DOUBLE => Ok(8),
            _ => Err(self.mismatch("float or double matrix")),
        }
    }

    fn read_elements(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        Ok(match self.element_size()? {
            4 => bytes.chunks_exact(4).map(|c| f64::from(be_f32(c))).collect(),
            _ => bytes.chunks_exact(8).map(be_f64).collect(),
        })
    }

    /// Dense float or double matrix, widened to `f64`.
    pub fn as_matrix(&self) -> Result<Array2<f64>> {
        if !self.is_matrix() || self.is_sparse_matrix() {
            return Err(self.mismatch("dense matrix"));
        }
        let elem = self.element_size()?;
        let (dims, used) = self.matrix_dims(0)?;
        // Dimensions are stored fastest-varying first
        let (nrows, ncols) = (dims[1], dims[0]);
        let body = &self.data[..self.data.len() - used];
        if body.len() != nrows * ncols * elem {
            return Err(self.malformed(format!(
                "{} payload bytes for a {nrows} x {ncols} matrix",
                body.len()
            )));
        }
        let values = self.read_elements(body)?;
        Array2::from_shape_vec((nrows, ncols), values).map_err(|e| self.malformed(e.to_string()))
    }

    /// Compressed sparse matrix, widened to `f64`.
    pub fn as_sparse(&self) -> Result<SparseMatrix> {
        if !self.is_sparse_matrix() {
            return Err(self.mismatch("sparse matrix"));
        }
        let format = if self.ty & FIFFTS_MC_CCS != 0 {
            SparseFormat::Ccs
        } else {
            SparseFormat::Rcs
        };
        let elem = self.element_size()?;
        let (dims, used) = self.matrix_dims(1)?;
        let (nnz, nrows, ncols) = (dims[0], dims[1], dims[2]);
        let nptr = match format {
            SparseFormat::Ccs => ncols + 1,
            SparseFormat::Rcs => nrows + 1,
        };

        let body = &self.data[..self.data.len() - used];
        let expected = nnz * elem + 4 * nnz + 4 * nptr;
        if body.len() != expected {
            return Err(self.malformed(format!(
                "{} payload bytes, expected {expected} for {nnz} nonzeros",
                body.len()
            )));
        }

        let (values, rest) = body.split_at(nnz * elem);
        let (indices, indptr) = rest.split_at(4 * nnz);
        let to_index = |c: &[u8]| {
            let v = be_i32(c);
            usize::try_from(v).map_err(|_| self.malformed(format!("negative index {v}")))
        };

        SparseMatrix::new(
            format,
            (nrows, ncols),
            self.read_elements(values)?,
            indices
                .chunks_exact(4)
                .map(to_index)
                .collect::<Result<Vec<_>>>()?,
            indptr
                .chunks_exact(4)
                .map(to_index)
                .collect::<Result<Vec<_>>>()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_tag(kind: i32, values: &[i32]) -> Tag {
        Tag::new(
            kind,
            FIFFT_INT,
            values.iter().flat_map(|v| v.to_be_bytes()).collect(),
        )
    }

    #[test]
    fn test_int_tag() {
        let tag = int_tag(FIFF_MNE_COV_DIM, &[306]);
        assert_eq!(tag.as_int().unwrap(), 306);
    }

    #[test]
    fn test_type_mismatch() {
        let tag = int_tag(FIFF_MNE_COV_DIM, &[1]);
        assert!(matches!(
            tag.as_string(),
            Err(FiffError::TypeMismatch { kind: FIFF_MNE_COV_DIM, .. })
        ));
    }

    #[test]
    fn test_empty_name_list() {
        let tag = Tag::new(FIFF_MNE_ROW_NAMES, FIFFT_STRING, Vec::new());
        assert!(tag.as_name_list().unwrap().is_empty());
    }

    #[test]
    fn test_name_list_split() {
        let tag = Tag::new(FIFF_MNE_ROW_NAMES, FIFFT_STRING, b"MEG 0111:EEG 001".to_vec());
        assert_eq!(tag.as_name_list().unwrap(), vec!["MEG 0111", "EEG 001"]);
    }

    #[test]
    fn test_dense_matrix_layout() {
        // 2 x 3 float matrix, dims stored reversed then ndim
        let mut data: Vec<u8> = (1..=6).flat_map(|v| (v as f32).to_be_bytes()).collect();
        for d in [3i32, 2, 2] {
            data.extend(d.to_be_bytes());
        }
        let tag = Tag::new(FIFF_PROJ_ITEM_VECTORS, FIFFT_MATRIX_FLOAT, data);
        let m = tag.as_matrix().unwrap();
        assert_eq!(m.dim(), (2, 3));
        assert_eq!(m[[0, 2]], 3.0);
        assert_eq!(m[[1, 0]], 4.0);
    }

    #[test]
    fn test_truncated_matrix_rejected() {
        let mut data: Vec<u8> = (1..=5).flat_map(|v| (v as f32).to_be_bytes()).collect();
        for d in [3i32, 2, 2] {
            data.extend(d.to_be_bytes());
        }
        let tag = Tag::new(FIFF_PROJ_ITEM_VECTORS, FIFFT_MATRIX_FLOAT, data);
        assert!(matches!(tag.as_matrix(), Err(FiffError::Malformed { .. })));
    }

    #[test]
    fn test_file_id_roundtrip() {
        let id = FileId::now();
        let tag = Tag::new(FIFF_FILE_ID, FIFFT_ID_STRUCT, id.to_bytes());
        let back = tag.as_file_id().unwrap();
        assert_eq!(back.version, FIFFC_VERSION);
        assert_eq!(back.time.timestamp(), id.time.timestamp());
    }

    #[test]
    fn test_file_id_with_oversized_microseconds() {
        // version, machine id, seconds, microseconds
        let data: Vec<u8> = [FIFFC_VERSION, 0, 0, 1_700_000_000, 5_000_000]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let tag = Tag::new(FIFF_FILE_ID, FIFFT_ID_STRUCT, data);
        assert!(matches!(
            tag.as_file_id(),
            Err(FiffError::Malformed { kind: FIFF_FILE_ID, .. })
        ));
    }
}
