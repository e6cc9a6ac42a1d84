//! Optimized scalar quantization for binary-quantized vector scoring.
//!
//! ## Notation
//!
//! | Symbol | Description |
//! |--------|-------------|
//! | `c` | Segment centroid |
//! | `d` | Index-side data vector |
//! | `q` | Query vector |
//! | `x = v - c` | Centroid-relative vector (either side) |
//! | `[a, b]` | Quantization interval (`lower_interval`, `upper_interval`) |
//! | `k[i]` | Quantized component, `round((clamp(x[i], a, b) - a) / Δ)` |
//! | `Δ = (b - a) / (2^bits - 1)` | Quantization step |
//!
//! ## Stored Values
//!
//! | Field | Value | Description |
//! |-------|-------|-------------|
//! | `lower_interval` | `a` | Lower bound of the affine grid |
//! | `upper_interval` | `b` | Upper bound of the affine grid |
//! | `additional_correction` | `‖x‖²` or `⟨v, c⟩` | Euclidean: squared residual norm. Otherwise: non-centered dot with the centroid |
//! | `quantized_component_sum` | `Σ k[i]` | Recovers the linear terms of the reconstruction |
//!
//! ## Inner Product Estimation
//!
//! Each component is reconstructed as `x[i] ≈ a + Δ·k[i]`, so for an index
//! vector (1 bit, `Δ_d = b_d - a_d`) and a query (4 bits):
//!
//! ```text
//! ⟨x_d, x_q⟩ ≈ Σ (a_d + Δ_d·k_d[i]) · (a_q + Δ_q·k_q[i])
//!            = a_d·a_q·dim + a_q·Δ_d·Σk_d + a_d·Δ_q·Σk_q + Δ_d·Δ_q·⟨k_d, k_q⟩
//! ```
//!
//! `⟨k_d, k_q⟩` is the only term that needs both vectors. With the query
//! split into four bit planes `k_q^(j)` it is
//!
//! ```text
//! ⟨k_d, k_q⟩ = Σ_j 2^j · popcount(k_d AND k_q^(j))
//! ```
//!
//! The centroid is folded back in with
//!
//! ```text
//! ⟨d, q⟩ = ⟨x_d, x_q⟩ + ⟨d, c⟩ + ⟨q, c⟩ - ‖c‖²
//! ‖d - q‖² = ‖x_d‖² + ‖x_q‖² - 2·⟨x_d, x_q⟩
//! ```
//!
//! which is why the additional correction differs between euclidean and the
//! inner-product similarities. See [`corrections::apply_corrections`].

pub mod corrections;
pub mod packing;
pub mod quantizer;

use bqscore_distance::dot;
use bqscore_error::{ErrorCodes, ScoringError};
use thiserror::Error;

pub use corrections::apply_corrections;
pub use packing::{pack_as_binary, transpose_half_byte, unpack_binary, untranspose_half_byte};
pub use quantizer::OptimizedScalarQuantizer;

/// Bits per component on the index side.
pub const INDEX_BITS: u8 = 1;
/// Bits per component on the query side.
pub const QUERY_BITS: u8 = 4;

#[derive(Error, Debug, PartialEq)]
pub enum QuantizationError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Component {index} is not finite")]
    NonFiniteComponent { index: usize },
    #[error("Cosine similarity requires unit vectors, got squared norm {norm_sq}")]
    NotUnitVector { norm_sq: f32 },
    #[error("Unsupported bit width {0}, expected 1..=8")]
    UnsupportedBits(u8),
    #[error("{dims} dimensions exceed the record format limit of {max}")]
    TooManyDimensions { dims: usize, max: usize },
}

impl ScoringError for QuantizationError {
    fn code(&self) -> ErrorCodes {
        match self {
            QuantizationError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
            QuantizationError::NonFiniteComponent { .. } => ErrorCodes::InvalidArgument,
            QuantizationError::NotUnitVector { .. } => ErrorCodes::InvalidArgument,
            QuantizationError::UnsupportedBits(_) => ErrorCodes::InvalidArgument,
            QuantizationError::TooManyDimensions { .. } => ErrorCodes::OutOfRange,
        }
    }
}

/// Interval and correction terms of one quantized vector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuantizationResult {
    pub lower_interval: f32,
    pub upper_interval: f32,
    pub additional_correction: f32,
    pub quantized_component_sum: u32,
}

/// A query encoded once per search request.
///
/// `bits` holds the 4-bit components transposed into four bit planes
/// (see [`transpose_half_byte`]).
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizedQuery {
    bits: Vec<u8>,
    corrections: QuantizationResult,
}

impl QuantizedQuery {
    pub fn new(bits: Vec<u8>, corrections: QuantizationResult) -> Self {
        Self { bits, corrections }
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn corrections(&self) -> &QuantizationResult {
        &self.corrections
    }
}

/// Self dot product of the centroid, consumed by the correction function.
pub fn centroid_dp(centroid: &[f32]) -> f32 {
    dot(centroid, centroid)
}

/// Rounds `value` up to a multiple of `bucket`.
pub fn discretize(value: usize, bucket: usize) -> usize {
    value.div_ceil(bucket) * bucket
}

/// Reconstructs the centroid-relative vector from quantized components.
pub fn dequantize(components: &[u8], result: &QuantizationResult, bits: u8) -> Vec<f32> {
    let steps = ((1u32 << bits) - 1) as f32;
    let step = (result.upper_interval - result.lower_interval) / steps;
    components
        .iter()
        .map(|&k| result.lower_interval + step * k as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discretize() {
        assert_eq!(discretize(384, 64), 384);
        assert_eq!(discretize(300, 64), 320);
        assert_eq!(discretize(1, 64), 64);
        assert_eq!(discretize(0, 64), 0);
    }

    #[test]
    fn test_dequantize_endpoints() {
        let result = QuantizationResult {
            lower_interval: -1.0,
            upper_interval: 2.0,
            additional_correction: 0.0,
            quantized_component_sum: 15,
        };
        assert_eq!(dequantize(&[0, 15], &result, 4), vec![-1.0, 2.0]);
        assert_eq!(dequantize(&[0, 1], &result, 1), vec![-1.0, 2.0]);
    }
}
