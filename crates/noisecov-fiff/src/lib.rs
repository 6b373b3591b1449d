#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod error;
pub mod sparse;
pub mod tag;
pub mod tree;
pub mod write;

pub use error::{FiffError, Result};
pub use sparse::{SparseFormat, SparseMatrix};
pub use tag::{FileId, Tag};
pub use tree::{Node, open, parse};
pub use write::FiffWriter;
