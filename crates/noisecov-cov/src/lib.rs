#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/noisecov/noisecov/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod estimate;
pub mod info;
pub mod kind;
pub mod linalg;
pub mod model;
pub mod proj;
pub mod rank;
pub mod regularize;
pub mod source;
pub mod whitener;

// Re-export main types
pub use codec::{read_cov, read_cov_file, write_cov, write_cov_file};
pub use config::{EstimatorConfig, WhitenerConfig};
pub use error::{CovError, ErrorKind, Result};
pub use estimate::StreamingEstimator;
pub use info::{ChannelInfo, ChannelKind, MeasurementInfo, MegSelection};
pub use kind::CovarianceKind;
pub use linalg::EigenDecomposition;
pub use model::{Covariance, CovarianceData};
pub use proj::{Projection, Projector, make_projector};
pub use rank::rank;
pub use regularize::{ModalityGroups, RegularizedCovariance, regularize};
pub use source::{ArraySource, SampleSource};
pub use whitener::{Modality, Whitener, build_whitener};
