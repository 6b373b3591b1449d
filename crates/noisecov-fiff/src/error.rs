//! Error types for container operations.

use thiserror::Error;

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, FiffError>;

/// Errors that can occur while reading or writing a container file.
#[derive(Debug, Error)]
pub enum FiffError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with a file id tag
    #[error("Not a FIFF file: first tag has kind {0}")]
    NotAFiffFile(i32),

    /// A tag header or payload ends before its declared size
    #[error("Truncated tag at byte {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Byte offset of the tag header
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes remaining in the file
        available: usize,
    },

    /// Block start and end tags do not nest
    #[error("Unbalanced block structure: {0}")]
    UnbalancedBlock(String),

    /// A tag does not hold the data type the caller asked for
    #[error("Tag {kind} has type {actual:#x}, expected {expected}")]
    TypeMismatch {
        /// Tag kind
        kind: i32,
        /// Description of the expected type
        expected: &'static str,
        /// Type code found in the file
        actual: i32,
    },

    /// A payload's size is inconsistent with its declared shape
    #[error("Malformed payload in tag {kind}: {reason}")]
    Malformed {
        /// Tag kind
        kind: i32,
        /// What was inconsistent
        reason: String,
    },

    /// Sparse matrix index structure is inconsistent
    #[error("Invalid sparse matrix: {0}")]
    InvalidSparse(String),

    /// A channel name cannot be stored in a colon-joined name list
    #[error("Invalid name in name list: {0:?}")]
    InvalidName(String),

    /// A value does not fit the 32 bit fields of the format
    #[error("Value out of range for tag {kind}: {value}")]
    OutOfRange {
        /// Tag kind
        kind: i32,
        /// Offending value
        value: usize,
    },
}
