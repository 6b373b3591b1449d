//! Sequential writer producing a well-formed tag stream.

use crate::constants::*;
use crate::error::{FiffError, Result};
use crate::sparse::{SparseFormat, SparseMatrix};
use crate::tag::FileId;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes tags sequentially and keeps track of open blocks.
#[derive(Debug)]
pub struct FiffWriter<W: Write> {
    inner: W,
    open_blocks: Vec<i32>,
}

impl FiffWriter<BufWriter<File>> {
    /// Create (or truncate) a file and write the file header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file))
    }
}

fn to_i32(kind: i32, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| FiffError::OutOfRange { kind, value })
}

/// Matrix dimensions followed by the number of dimensions, always 2 here.
fn dims_trailer(kind: i32, dims: &[usize]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 * (dims.len() + 1));
    for &d in dims {
        out.extend(to_i32(kind, d)?.to_be_bytes());
    }
    out.extend(2i32.to_be_bytes());
    Ok(out)
}

impl<W: Write> FiffWriter<W> {
    /// Wrap a sink and write the file id and directory pointer.
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = Self {
            inner,
            open_blocks: Vec::new(),
        };
        writer.write_tag(FIFF_FILE_ID, FIFFT_ID_STRUCT, &FileId::now().to_bytes())?;
        writer.write_int(FIFF_DIR_POINTER, -1)?;
        Ok(writer)
    }

    fn write_tag_with_next(&mut self, kind: i32, ty: i32, payload: &[u8], next: i32) -> Result<()> {
        let size = to_i32(kind, payload.len())?;
        for v in [kind, ty, size, next] {
            self.inner.write_all(&v.to_be_bytes())?;
        }
        self.inner.write_all(payload)?;
        Ok(())
    }

    /// Write a tag with an arbitrary, already encoded payload.
    pub fn write_tag(&mut self, kind: i32, ty: i32, payload: &[u8]) -> Result<()> {
        self.write_tag_with_next(kind, ty, payload, FIFFV_NEXT_SEQ)
    }

    /// Open a block.
    pub fn start_block(&mut self, block: i32) -> Result<()> {
        self.write_int(FIFF_BLOCK_START, block)?;
        self.open_blocks.push(block);
        Ok(())
    }

    /// Close the innermost block, which must be of the given kind.
    pub fn end_block(&mut self, block: i32) -> Result<()> {
        match self.open_blocks.pop() {
            Some(open) if open == block => self.write_int(FIFF_BLOCK_END, block),
            Some(open) => Err(FiffError::UnbalancedBlock(format!(
                "block {open} closed as {block}"
            ))),
            None => Err(FiffError::UnbalancedBlock(format!(
                "end of block {block} without a start"
            ))),
        }
    }

    /// Write a single integer.
    pub fn write_int(&mut self, kind: i32, value: i32) -> Result<()> {
        self.write_tag(kind, FIFFT_INT, &value.to_be_bytes())
    }

    /// Write a single float.
    pub fn write_float(&mut self, kind: i32, value: f32) -> Result<()> {
        self.write_tag(kind, FIFFT_FLOAT, &value.to_be_bytes())
    }

    /// Write an array of doubles.
    pub fn write_double(&mut self, kind: i32, values: &[f64]) -> Result<()> {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_tag(kind, FIFFT_DOUBLE, &payload)
    }

    /// Write a string.
    pub fn write_string(&mut self, kind: i32, value: &str) -> Result<()> {
        self.write_tag(kind, FIFFT_STRING, value.as_bytes())
    }

    /// Write names joined by `:`; names must be non-empty and may not
    /// contain the separator.
    pub fn write_name_list(&mut self, kind: i32, names: &[String]) -> Result<()> {
        if let Some(bad) = names.iter().find(|n| n.is_empty() || n.contains(':')) {
            return Err(FiffError::InvalidName(bad.clone()));
        }
        self.write_string(kind, &names.join(":"))
    }

    /// Write a dense matrix in single precision.
    pub fn write_float_matrix(&mut self, kind: i32, matrix: &Array2<f64>) -> Result<()> {
        let (nrows, ncols) = matrix.dim();
        let mut payload: Vec<u8> = matrix
            .iter()
            .flat_map(|&v| (v as f32).to_be_bytes())
            .collect();
        payload.extend(dims_trailer(kind, &[ncols, nrows])?);
        self.write_tag(kind, FIFFT_MATRIX_FLOAT, &payload)
    }

    /// Write a dense matrix in double precision.
    pub fn write_double_matrix(&mut self, kind: i32, matrix: &Array2<f64>) -> Result<()> {
        let (nrows, ncols) = matrix.dim();
        let mut payload: Vec<u8> = matrix.iter().flat_map(|v| v.to_be_bytes()).collect();
        payload.extend(dims_trailer(kind, &[ncols, nrows])?);
        self.write_tag(kind, FIFFT_MATRIX_DOUBLE, &payload)
    }

    /// Write a compressed sparse matrix in double precision.
    pub fn write_sparse_matrix(&mut self, kind: i32, matrix: &SparseMatrix) -> Result<()> {
        let coding = match matrix.format() {
            SparseFormat::Ccs => FIFFTS_MC_CCS,
            SparseFormat::Rcs => FIFFTS_MC_RCS,
        };
        let mut payload: Vec<u8> = matrix.data().iter().flat_map(|v| v.to_be_bytes()).collect();
        for &i in matrix.indices().iter().chain(matrix.indptr()) {
            payload.extend(to_i32(kind, i)?.to_be_bytes());
        }
        let (nrows, ncols) = matrix.shape();
        payload.extend(dims_trailer(kind, &[matrix.nnz(), nrows, ncols])?);
        self.write_tag(kind, FIFFT_MATRIX | coding | FIFFT_DOUBLE, &payload)
    }

    /// Terminate the file and flush, returning the sink.
    pub fn finish(mut self) -> Result<W> {
        if let Some(open) = self.open_blocks.last() {
            return Err(FiffError::UnbalancedBlock(format!(
                "block {open} still open at end of file"
            )));
        }
        self.write_tag_with_next(FIFF_NOP, FIFFT_VOID, &[], FIFFV_NEXT_NONE)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::parse;
    use approx::assert_abs_diff_eq;

    fn written(build: impl FnOnce(&mut FiffWriter<Vec<u8>>) -> Result<()>) -> Vec<u8> {
        let mut writer = FiffWriter::new(Vec::new()).unwrap();
        build(&mut writer).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_typed_values_read_back() {
        let matrix = Array2::from_shape_vec((2, 3), vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0]).unwrap();
        let bytes = written(|w| {
            w.start_block(FIFFB_MNE_COV)?;
            w.write_int(FIFF_MNE_COV_KIND, 1)?;
            w.write_double(FIFF_MNE_COV_DIAG, &[1.0, 2.0])?;
            w.write_name_list(FIFF_MNE_ROW_NAMES, &["A".to_string(), "B".to_string()])?;
            w.write_double_matrix(FIFF_MNE_COV_EIGENVECTORS, &matrix)?;
            w.end_block(FIFFB_MNE_COV)
        });

        let (_, root) = parse(&bytes).unwrap();
        let cov = root.dir_tree_find(FIFFB_MNE_COV)[0];
        assert_eq!(cov.find_tag(FIFF_MNE_COV_KIND).unwrap().as_int().unwrap(), 1);
        assert_eq!(
            cov.find_tag(FIFF_MNE_COV_DIAG).unwrap().as_doubles().unwrap(),
            vec![1.0, 2.0]
        );
        assert_eq!(
            cov.find_tag(FIFF_MNE_ROW_NAMES).unwrap().as_name_list().unwrap(),
            vec!["A", "B"]
        );
        let back = cov
            .find_tag(FIFF_MNE_COV_EIGENVECTORS)
            .unwrap()
            .as_matrix()
            .unwrap();
        assert_eq!(back, matrix);
    }

    #[test]
    fn test_float_matrix_loses_precision_only() {
        let matrix = Array2::from_shape_vec((2, 2), vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        let bytes = written(|w| w.write_float_matrix(FIFF_PROJ_ITEM_VECTORS, &matrix));
        let (_, root) = parse(&bytes).unwrap();
        let back = root
            .find_tag(FIFF_PROJ_ITEM_VECTORS)
            .unwrap()
            .as_matrix()
            .unwrap();
        for (a, b) in matrix.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_sparse_matrix_read_back() {
        let dense =
            Array2::from_shape_vec((3, 3), vec![1.0, 0.0, 0.2, 0.0, 2.0, 0.0, 0.2, 0.0, 3.0])
                .unwrap();
        let sparse = SparseMatrix::from_dense(&dense);
        let bytes = written(|w| w.write_sparse_matrix(FIFF_MNE_COV, &sparse));
        let (_, root) = parse(&bytes).unwrap();
        let tag = root.find_tag(FIFF_MNE_COV).unwrap();
        assert!(tag.is_sparse_matrix());
        assert_eq!(tag.as_sparse().unwrap(), sparse);
    }

    #[test]
    fn test_name_with_separator_rejected() {
        let mut writer = FiffWriter::new(Vec::new()).unwrap();
        let err = writer
            .write_name_list(FIFF_MNE_ROW_NAMES, &["A:B".to_string()])
            .unwrap_err();
        assert!(matches!(err, FiffError::InvalidName(name) if name == "A:B"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut writer = FiffWriter::new(Vec::new()).unwrap();
        let err = writer
            .write_name_list(FIFF_MNE_ROW_NAMES, &["A".to_string(), String::new()])
            .unwrap_err();
        assert!(matches!(err, FiffError::InvalidName(name) if name.is_empty()));
    }

    #[test]
    fn test_finish_with_open_block_fails() {
        let mut writer = FiffWriter::new(Vec::new()).unwrap();
        writer.start_block(FIFFB_MNE_COV).unwrap();
        assert!(matches!(writer.finish(), Err(FiffError::UnbalancedBlock(_))));
    }

    #[test]
    fn test_mismatched_end_block_fails() {
        let mut writer = FiffWriter::new(Vec::new()).unwrap();
        writer.start_block(FIFFB_MNE_COV).unwrap();
        assert!(writer.end_block(FIFFB_PROJ).is_err());
    }
}
