#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/noisecov/noisecov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

// Re-export sub-crates
pub use noisecov_cov as cov;
pub use noisecov_fiff as fiff;

// Re-export common types
pub use noisecov_cov::{
    ArraySource, ChannelInfo, ChannelKind, CovError, Covariance, CovarianceData, CovarianceKind,
    EstimatorConfig, MeasurementInfo, Projection, SampleSource, StreamingEstimator, Whitener,
    WhitenerConfig,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
