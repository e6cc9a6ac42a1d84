use bqscore_error::{ErrorCodes, ScoringError};
use serde::Deserialize;
use thiserror::Error;

/// The similarity a segment was indexed for.
///
/// Decides how vectors must be prepared before quantization (cosine inputs are
/// unit length) and how the correction terms are combined into a score.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    Euclidean,
    DotProduct,
    Cosine,
    MaximumInnerProduct,
}

impl SimilarityKind {
    pub const ALL: [SimilarityKind; 4] = [
        SimilarityKind::Euclidean,
        SimilarityKind::DotProduct,
        SimilarityKind::Cosine,
        SimilarityKind::MaximumInnerProduct,
    ];

    /// Whether the additional correction holds the squared residual norm
    /// (`true`) or the non-centered dot product with the centroid (`false`).
    pub fn uses_residual_norm(&self) -> bool {
        matches!(self, SimilarityKind::Euclidean)
    }
}

#[derive(Error, Debug)]
pub enum SimilarityKindError {
    #[error("Invalid similarity `{0}`")]
    InvalidSimilarity(String),
}

impl ScoringError for SimilarityKindError {
    fn code(&self) -> ErrorCodes {
        match self {
            SimilarityKindError::InvalidSimilarity(_) => ErrorCodes::InvalidArgument,
        }
    }
}

impl TryFrom<&str> for SimilarityKind {
    type Error = SimilarityKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "l2" | "euclidean" => Ok(SimilarityKind::Euclidean),
            "dot_product" => Ok(SimilarityKind::DotProduct),
            "cosine" => Ok(SimilarityKind::Cosine),
            "ip" | "maximum_inner_product" => Ok(SimilarityKind::MaximumInnerProduct),
            _ => Err(SimilarityKindError::InvalidSimilarity(value.to_string())),
        }
    }
}

impl From<SimilarityKind> for String {
    fn from(kind: SimilarityKind) -> Self {
        match kind {
            SimilarityKind::Euclidean => "euclidean".to_string(),
            SimilarityKind::DotProduct => "dot_product".to_string(),
            SimilarityKind::Cosine => "cosine".to_string(),
            SimilarityKind::MaximumInnerProduct => "maximum_inner_product".to_string(),
        }
    }
}

impl std::fmt::Display for SimilarityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: String = (*self).into();
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_kind_names_round_trip() {
        for kind in SimilarityKind::ALL {
            let name: String = kind.into();
            assert_eq!(SimilarityKind::try_from(name.as_str()).unwrap(), kind);
        }
        assert_eq!(
            SimilarityKind::try_from("l2").unwrap(),
            SimilarityKind::Euclidean
        );
        assert!(SimilarityKind::try_from("hamming").is_err());
    }

    #[test]
    fn test_similarity_kind_deserialize() {
        let kind: SimilarityKind = serde_json::from_str("\"maximum_inner_product\"").unwrap();
        assert_eq!(kind, SimilarityKind::MaximumInnerProduct);
        assert!(SimilarityKind::Euclidean.uses_residual_norm());
        assert!(!SimilarityKind::Cosine.uses_residual_norm());
    }
}
