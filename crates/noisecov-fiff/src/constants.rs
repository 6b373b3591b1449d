//! Block kinds, tag kinds and data type codes.
//!
//! Values follow the FIFF registry so files interoperate with other
//! readers of the format.

// File framing
/// File identification tag, always first in a file.
pub const FIFF_FILE_ID: i32 = 100;
/// Pointer to the tag directory (`-1` when absent).
pub const FIFF_DIR_POINTER: i32 = 101;
/// Opens a block; payload is the block kind.
pub const FIFF_BLOCK_START: i32 = 104;
/// Closes a block; payload is the block kind.
pub const FIFF_BLOCK_END: i32 = 105;
/// Padding tag, also used to terminate a file.
pub const FIFF_NOP: i32 = 108;

// Generic tags
/// Name of an item.
pub const FIFF_NAME: i32 = 3;
/// Number of channels.
pub const FIFF_NCHAN: i32 = 200;
/// Free-text description.
pub const FIFF_DESCRIPTION: i32 = 206;

// Projection items
/// Projection block.
pub const FIFFB_PROJ: i32 = 313;
/// A single projection item inside [`FIFFB_PROJ`].
pub const FIFFB_PROJ_ITEM: i32 = 314;
/// Kind of a projection item.
pub const FIFF_PROJ_ITEM_KIND: i32 = 3411;
/// Time stamp of a field projection item.
pub const FIFF_PROJ_ITEM_TIME: i32 = 3412;
/// Number of projection vectors.
pub const FIFF_PROJ_ITEM_NVEC: i32 = 3414;
/// Projection vectors, `nvec × nchan`.
pub const FIFF_PROJ_ITEM_VECTORS: i32 = 3415;
/// Channel names the vectors are defined on.
pub const FIFF_PROJ_ITEM_CH_NAME_LIST: i32 = 3417;
/// Whether a projection item is active.
pub const FIFF_MNE_PROJ_ITEM_ACTIVE: i32 = 3560;

// Covariance records
/// Covariance block.
pub const FIFFB_MNE_COV: i32 = 352;
/// Bad channel block nested in a covariance block.
pub const FIFFB_MNE_BAD_CHANNELS: i32 = 359;
/// Row names of a matrix (channel names of a covariance).
pub const FIFF_MNE_ROW_NAMES: i32 = 3502;
/// Generic channel name list.
pub const FIFF_MNE_CH_NAME_LIST: i32 = 3507;
/// Covariance kind.
pub const FIFF_MNE_COV_KIND: i32 = 3520;
/// Covariance dimension.
pub const FIFF_MNE_COV_DIM: i32 = 3521;
/// Covariance data: packed lower triangle or sparse matrix.
pub const FIFF_MNE_COV: i32 = 3522;
/// Covariance data: diagonal only.
pub const FIFF_MNE_COV_DIAG: i32 = 3523;
/// Precomputed eigenvalues.
pub const FIFF_MNE_COV_EIGENVALUES: i32 = 3524;
/// Precomputed eigenvectors.
pub const FIFF_MNE_COV_EIGENVECTORS: i32 = 3525;
/// Degrees of freedom of the estimate.
pub const FIFF_MNE_COV_NFREE: i32 = 3526;

// Data types
/// No payload.
pub const FIFFT_VOID: i32 = 0;
/// 32 bit signed integer.
pub const FIFFT_INT: i32 = 3;
/// 32 bit float.
pub const FIFFT_FLOAT: i32 = 4;
/// 64 bit float.
pub const FIFFT_DOUBLE: i32 = 5;
/// Byte string without terminator.
pub const FIFFT_STRING: i32 = 10;
/// File id structure.
pub const FIFFT_ID_STRUCT: i32 = 31;

/// Matrix coding bit.
pub const FIFFT_MATRIX: i32 = 0x4000_0000;
/// Compressed column storage sparse coding.
pub const FIFFTS_MC_CCS: i32 = 0x0010_0000;
/// Compressed row storage sparse coding.
pub const FIFFTS_MC_RCS: i32 = 0x0020_0000;
/// Mask selecting the matrix coding part of a type.
pub const FIFFTS_MC_MASK: i32 = 0x7FFF_0000;
/// Mask selecting the element type part of a type.
pub const FIFFTS_FS_MASK: i32 = 0x0000_FFFF;

/// Dense float matrix.
pub const FIFFT_MATRIX_FLOAT: i32 = FIFFT_MATRIX | FIFFT_FLOAT;
/// Dense double matrix.
pub const FIFFT_MATRIX_DOUBLE: i32 = FIFFT_MATRIX | FIFFT_DOUBLE;

// Tag chaining
/// The next tag follows immediately.
pub const FIFFV_NEXT_SEQ: i32 = 0;
/// No further tags.
pub const FIFFV_NEXT_NONE: i32 = -1;

/// File format version written into the file id (1.3).
pub const FIFFC_VERSION: i32 = (1 << 16) | 3;

/// Size of a tag header in bytes.
pub const TAG_HEADER_SIZE: usize = 16;
