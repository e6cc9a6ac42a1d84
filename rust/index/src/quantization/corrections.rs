//! The correction function shared by every scorer implementation.

use bqscore_distance::{
    dot_product_similarity, euclidean_similarity, scale_max_inner_product_score, SimilarityKind,
};

use super::{QuantizationResult, QUERY_BITS};

/// `1 / (2^QUERY_BITS - 1)`: the query interval is split into 15 steps.
const FOUR_BIT_SCALE: f32 = 1.0 / ((1u32 << QUERY_BITS) - 1) as f32;

/// Maps the raw quantized dot product `⟨k_d, k_q⟩` to a similarity score.
///
/// Every scorer must call exactly this function so that the scalar and
/// accelerated paths only differ by how `qc_dist` was computed.
///
/// ```text
/// ⟨x_d, x_q⟩ ≈ a_d·a_q·dim + a_q·Δ_d·Σk_d + a_d·Δ_q·Σk_q + Δ_d·Δ_q·qc_dist
/// ```
///
/// where `Δ_d = b_d - a_d` (1-bit index codes need no scaling) and
/// `Δ_q = (b_q - a_q) / 15`.
#[inline]
pub fn apply_corrections(
    dims: usize,
    similarity: SimilarityKind,
    centroid_dp: f32,
    qc_dist: f32,
    query: &QuantizationResult,
    index: &QuantizationResult,
) -> f32 {
    let x1 = index.quantized_component_sum as f32;
    let ax = index.lower_interval;
    let lx = index.upper_interval - ax;
    let ay = query.lower_interval;
    let ly = (query.upper_interval - ay) * FOUR_BIT_SCALE;
    let y1 = query.quantized_component_sum as f32;
    let score = ax * ay * dims as f32 + ay * lx * x1 + ax * ly * y1 + lx * ly * qc_dist;

    match similarity {
        // ‖d - q‖² = ‖x_d‖² + ‖x_q‖² - 2⟨x_d, x_q⟩, additional corrections hold ‖x‖².
        SimilarityKind::Euclidean => {
            let distance =
                query.additional_correction + index.additional_correction - 2.0 * score;
            euclidean_similarity(distance)
        }
        // ⟨d, q⟩ = ⟨x_d, x_q⟩ + ⟨d, c⟩ + ⟨q, c⟩ - ‖c‖², additional corrections hold ⟨v, c⟩.
        SimilarityKind::DotProduct | SimilarityKind::Cosine => dot_product_similarity(
            score + query.additional_correction + index.additional_correction - centroid_dp,
        ),
        SimilarityKind::MaximumInnerProduct => scale_max_inner_product_score(
            score + query.additional_correction + index.additional_correction - centroid_dp,
        ),
    }
}
