//! Storage kind of a covariance matrix.

use crate::error::{CovError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Storage/semantic variant of a covariance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceKind {
    /// Dense symmetric matrix
    #[default]
    #[display("full")]
    Full,
    /// Sparse symmetric matrix
    #[display("sparse")]
    Sparse,
    /// Per-channel variances only
    #[display("diagonal")]
    Diagonal,
}

impl CovarianceKind {
    /// All kinds, in tag order.
    pub const ALL: [Self; 3] = [Self::Full, Self::Sparse, Self::Diagonal];

    /// Numeric value stored in the kind tag.
    pub const fn id(self) -> i32 {
        match self {
            Self::Full => 1,
            Self::Sparse => 2,
            Self::Diagonal => 3,
        }
    }

    /// Parse the numeric value stored in the kind tag.
    pub fn from_id(id: i32) -> Result<Self> {
        match id {
            1 => Ok(Self::Full),
            2 => Ok(Self::Sparse),
            3 => Ok(Self::Diagonal),
            other => Err(CovError::UnknownKindId(other)),
        }
    }
}

impl FromStr for CovarianceKind {
    type Err = CovError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "sparse" => Ok(Self::Sparse),
            "diagonal" => Ok(Self::Diagonal),
            other => Err(CovError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CovarianceKind::Full, 1, "full")]
    #[case(CovarianceKind::Sparse, 2, "sparse")]
    #[case(CovarianceKind::Diagonal, 3, "diagonal")]
    fn test_kind_mapping(#[case] kind: CovarianceKind, #[case] id: i32, #[case] name: &str) {
        assert_eq!(kind.id(), id);
        assert_eq!(CovarianceKind::from_id(id).unwrap(), kind);
        assert_eq!(kind.to_string(), name);
        assert_eq!(name.parse::<CovarianceKind>().unwrap(), kind);
    }

    #[test]
    fn test_unknown_kind() {
        assert!(matches!(
            "banded".parse::<CovarianceKind>(),
            Err(CovError::UnknownKind(name)) if name == "banded"
        ));
        assert!(matches!(
            CovarianceKind::from_id(7),
            Err(CovError::UnknownKindId(7))
        ));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&CovarianceKind::Diagonal).unwrap();
        assert_eq!(json, "\"diagonal\"");
    }
}
