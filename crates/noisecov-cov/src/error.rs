//! Error types for covariance operations.

use crate::kind::CovarianceKind;
use crate::whitener::Modality;
use noisecov_fiff::FiffError;
use thiserror::Error;

/// Result type for covariance operations.
pub type Result<T> = std::result::Result<T, CovError>;

/// Coarse classification of a [`CovError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something that is not supported
    Configuration,
    /// Stored or supplied data is missing or malformed
    Format,
    /// Data is well-formed but numerically unusable
    Precondition,
    /// The operating system reported a failure
    Io,
}

/// Errors that can occur while estimating, whitening or persisting a covariance.
#[derive(Debug, Error)]
pub enum CovError {
    /// Unknown covariance kind name
    #[error("Unknown type of covariance {0:?}. Choose between full, sparse or diagonal")]
    UnknownKind(String),

    /// Unknown numeric covariance kind
    #[error("Unknown covariance kind id {0}")]
    UnknownKindId(i32),

    /// Kind is valid but not supported by the requested operation
    #[error("Unsupported covariance kind for this operation: {0}")]
    UnsupportedKind(CovarianceKind),

    /// Chunk duration yields no samples per chunk
    #[error("Invalid chunk duration: {0} s")]
    InvalidChunkDuration(f64),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required tag is missing from a block
    #[error("{0} not found")]
    MissingTag(&'static str),

    /// The number of channel names does not match the dimension
    #[error("Number of names ({actual}) does not match covariance matrix dimension ({expected})")]
    NameCountMismatch {
        /// Declared dimension
        expected: usize,
        /// Number of names found
        actual: usize,
    },

    /// No covariance block of the requested kind
    #[error("Did not find the desired covariance matrix (kind = {0})")]
    NotFound(CovarianceKind),

    /// The file contains no covariance block at all
    #[error("No covariance matrices found")]
    NoCovariance,

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A channel name occurs more than once where names must be unique
    #[error("Duplicate channel name: {0}")]
    DuplicateChannel(String),

    /// Full or sparse covariance values are not symmetric
    #[error("Covariance matrix is not symmetric (asymmetry {asymmetry:e})")]
    NotSymmetric {
        /// Largest `|C[i,j] - C[j,i]|` relative to the largest entry
        asymmetry: f64,
    },

    /// A channel name is empty
    #[error("Channel name at position {0} is empty")]
    EmptyChannelName(usize),

    /// Container-level failure
    #[error("FIFF error: {0}")]
    Fiff(#[from] FiffError),

    /// An eigenvalue that must be inverted is zero or negligible
    #[error("Ill-conditioned {modality} covariance: eigenvalue {eigenvalue:e} cannot be inverted")]
    IllConditioned {
        /// Sensor modality being whitened
        modality: Modality,
        /// Offending eigenvalue
        eigenvalue: f64,
    },

    /// No MEG or EEG channel survived channel selection
    #[error("No channels selected for whitening")]
    NoChannelsSelected,

    /// The sample source yielded no samples
    #[error("Recording contains no samples in the requested range")]
    EmptyRecording,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CovError {
    /// Which class of failure this is.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownKind(_)
            | Self::UnknownKindId(_)
            | Self::UnsupportedKind(_)
            | Self::InvalidChunkDuration(_)
            | Self::InvalidParameter(_) => ErrorKind::Configuration,
            Self::MissingTag(_)
            | Self::NameCountMismatch { .. }
            | Self::NotFound(_)
            | Self::NoCovariance
            | Self::DimensionMismatch { .. }
            | Self::DuplicateChannel(_)
            | Self::NotSymmetric { .. }
            | Self::EmptyChannelName(_) => ErrorKind::Format,
            Self::Fiff(FiffError::Io(_)) | Self::Io(_) => ErrorKind::Io,
            Self::Fiff(_) => ErrorKind::Format,
            Self::IllConditioned { .. } | Self::NoChannelsSelected | Self::EmptyRecording => {
                ErrorKind::Precondition
            }
        }
    }
}
