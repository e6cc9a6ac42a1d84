use simsimd::SpatialSimilarity;

use crate::SimilarityKind;

/// Tolerance on `‖v‖²` used to accept a vector as unit length.
pub const UNIT_VECTOR_EPSILON: f32 = 1e-4;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    match f32::dot(a, b) {
        Some(d) => d as f32,
        None => dot_scalar(a, b),
    }
}

pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    match f32::l2sq(a, b) {
        Some(d) => d as f32,
        None => squared_euclidean_scalar(a, b),
    }
}

pub fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn squared_euclidean_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = dot(vector, vector).sqrt();
    vector.iter().map(|x| x / (norm + 1e-32)).collect()
}

pub fn is_unit_vector(vector: &[f32]) -> bool {
    (dot(vector, vector) - 1.0).abs() <= UNIT_VECTOR_EPSILON
}

/// Maps an unbounded inner product onto a positive, order-preserving score.
pub fn scale_max_inner_product_score(raw: f32) -> f32 {
    if raw < 0.0 {
        1.0 / (1.0 - raw)
    } else {
        raw + 1.0
    }
}

/// Converts a squared euclidean distance into a similarity in `(0, 1]`.
pub fn euclidean_similarity(squared_distance: f32) -> f32 {
    (1.0 / (1.0 + squared_distance)).max(0.0)
}

/// Converts a dot product of unit-scale vectors into a similarity in `[0, 1]`.
pub fn dot_product_similarity(dot: f32) -> f32 {
    ((1.0 + dot) / 2.0).max(0.0)
}

/// Exact similarity between two full-precision vectors, on the same scale as
/// the quantized scores.
pub fn similarity(kind: SimilarityKind, a: &[f32], b: &[f32]) -> f32 {
    match kind {
        SimilarityKind::Euclidean => euclidean_similarity(squared_euclidean(a, b)),
        SimilarityKind::DotProduct | SimilarityKind::Cosine => dot_product_similarity(dot(a, b)),
        SimilarityKind::MaximumInnerProduct => scale_max_inner_product_score(dot(a, b)),
    }
}
