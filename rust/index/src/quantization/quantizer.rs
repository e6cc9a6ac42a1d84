//! Optimized scalar quantizer.
//!
//! Quantizes a centroid-relative vector onto an affine grid `a + Δ·k` whose
//! interval `[a, b]` is chosen per vector. The interval starts from a
//! minimum-MSE grid for a normal distribution and is refined by coordinate
//! descent on an anisotropic loss that weighs error parallel to the vector
//! (which distorts inner products) more heavily than orthogonal error.

use bqscore_distance::{dot, SimilarityKind};

use super::packing::{pack_as_binary, transpose_half_byte};
use super::{QuantizationError, QuantizationResult, QuantizedQuery, INDEX_BITS, QUERY_BITS};
use crate::config::QuantizerConfig;
use crate::record::{EncodedRecord, RecordLayout};

/// Minimum-MSE interval, in standard deviations, for each bit width 1..=8.
const MINIMUM_MSE_GRID: [[f32; 2]; 8] = [
    [-0.798, 0.798],
    [-1.493, 1.493],
    [-2.051, 2.051],
    [-2.514, 2.514],
    [-2.916, 2.916],
    [-3.278, 3.278],
    [-3.611, 3.611],
    [-3.922, 3.922],
];

#[derive(Clone, Debug)]
pub struct OptimizedScalarQuantizer {
    similarity: SimilarityKind,
    lambda: f32,
    iterations: usize,
}

impl OptimizedScalarQuantizer {
    pub const DEFAULT_LAMBDA: f32 = 0.1;
    pub const DEFAULT_ITERATIONS: usize = 5;

    pub fn new(similarity: SimilarityKind) -> Self {
        Self {
            similarity,
            lambda: Self::DEFAULT_LAMBDA,
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }

    pub fn from_config(similarity: SimilarityKind, config: &QuantizerConfig) -> Self {
        Self {
            similarity,
            lambda: config.lambda,
            iterations: config.iterations,
        }
    }

    pub fn similarity(&self) -> SimilarityKind {
        self.similarity
    }

    /// Quantizes `vector - centroid` to `bits` per component.
    ///
    /// Writes one unpacked component per element of `destination` (which must
    /// hold at least `centroid.len()` entries) and returns the correction terms.
    pub fn scalar_quantize(
        &self,
        vector: &[f32],
        centroid: &[f32],
        bits: u8,
        destination: &mut [u8],
    ) -> Result<QuantizationResult, QuantizationError> {
        let dims = centroid.len();
        if vector.len() != dims {
            return Err(QuantizationError::DimensionMismatch {
                expected: dims,
                got: vector.len(),
            });
        }
        if destination.len() < dims {
            return Err(QuantizationError::DimensionMismatch {
                expected: dims,
                got: destination.len(),
            });
        }
        if bits == 0 || bits > 8 {
            return Err(QuantizationError::UnsupportedBits(bits));
        }
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(QuantizationError::NonFiniteComponent { index });
        }
        if self.similarity == SimilarityKind::Cosine {
            let norm_sq = dot(vector, vector);
            if (norm_sq - 1.0).abs() > bqscore_distance::UNIT_VECTOR_EPSILON {
                return Err(QuantizationError::NotUnitVector { norm_sq });
            }
        }
        if dims == 0 {
            return Ok(QuantizationResult {
                lower_interval: 0.0,
                upper_interval: 0.0,
                additional_correction: 0.0,
                quantized_component_sum: 0,
            });
        }

        // Single pass: residual, running mean/variance (Welford), extrema,
        // squared norm and, for the inner-product similarities, ⟨v, c⟩.
        let mut residual = Vec::with_capacity(dims);
        let mut mean = 0.0f64;
        let mut variance = 0.0f64;
        let mut norm_sq = 0.0f32;
        let mut centroid_dot = 0.0f32;
        let mut min = f32::MAX;
        let mut max = -f32::MAX;
        for (i, (&v, &c)) in vector.iter().zip(centroid).enumerate() {
            if !self.similarity.uses_residual_norm() {
                centroid_dot += v * c;
            }
            let x = v - c;
            min = min.min(x);
            max = max.max(x);
            norm_sq += x * x;
            let delta = x as f64 - mean;
            mean += delta / (i + 1) as f64;
            variance += delta * (x as f64 - mean);
            residual.push(x);
        }
        variance /= dims as f64;
        let std = variance.sqrt();

        let points = 1u32 << bits;
        let mut interval = initial_interval(bits, std, mean, min, max);
        self.optimize_interval(&mut interval, &residual, norm_sq, points);

        let [a, b] = interval;
        let max_component = points - 1;
        let step = (b - a) / max_component as f32;
        let mut component_sum = 0u32;
        for (dst, &x) in destination.iter_mut().zip(&residual) {
            let k = if step > 0.0 {
                ((clamp(x, a, b) - a) / step).round() as u32
            } else {
                0
            };
            let k = k.min(max_component);
            component_sum += k;
            *dst = k as u8;
        }

        Ok(QuantizationResult {
            lower_interval: a,
            upper_interval: b,
            additional_correction: if self.similarity.uses_residual_norm() {
                norm_sq
            } else {
                centroid_dot
            },
            quantized_component_sum: component_sum,
        })
    }

    /// Encodes an index-side vector into its on-disk record (1 bit per component).
    pub fn encode_index_vector(
        &self,
        vector: &[f32],
        centroid: &[f32],
    ) -> Result<EncodedRecord, QuantizationError> {
        let dims = centroid.len();
        if dims > RecordLayout::MAX_DIMS {
            return Err(QuantizationError::TooManyDimensions {
                dims,
                max: RecordLayout::MAX_DIMS,
            });
        }
        let layout = RecordLayout::new(dims);
        let mut components = vec![0u8; dims];
        let corrections = self.scalar_quantize(vector, centroid, INDEX_BITS, &mut components)?;
        let mut bits = vec![0u8; layout.packed_len()];
        pack_as_binary(&components, &mut bits);
        Ok(EncodedRecord::new(bits, corrections))
    }

    /// Encodes a query vector (4 bits per component, transposed into bit planes).
    pub fn encode_query(
        &self,
        vector: &[f32],
        centroid: &[f32],
    ) -> Result<QuantizedQuery, QuantizationError> {
        let layout = RecordLayout::new(centroid.len());
        let mut components = vec![0u8; centroid.len()];
        let corrections = self.scalar_quantize(vector, centroid, QUERY_BITS, &mut components)?;
        let mut bits = vec![0u8; layout.query_len()];
        transpose_half_byte(&components, &mut bits);
        Ok(QuantizedQuery::new(bits, corrections))
    }

    fn optimize_interval(&self, interval: &mut [f32; 2], x: &[f32], norm_sq: f32, points: u32) {
        // A collapsed interval has no step to optimize over.
        if !(interval[1] > interval[0]) {
            return;
        }
        let scale = (1.0 - self.lambda) / norm_sq;
        if !scale.is_finite() {
            return;
        }
        let scale = scale as f64;
        let lambda = self.lambda as f64;
        let steps = points as f32 - 1.0;
        let mut best_loss = self.loss(x, *interval, points, norm_sq);

        for _ in 0..self.iterations {
            let [a, b] = *interval;
            let step_inv = steps / (b - a);
            let (mut daa, mut dab, mut dbb, mut dax, mut dbx) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
            for &xi in x {
                let k = ((clamp(xi, a, b) - a) * step_inv).round();
                let s = (k / steps) as f64;
                let xi = xi as f64;
                daa += (1.0 - s) * (1.0 - s);
                dab += (1.0 - s) * s;
                dbb += s * s;
                dax += xi * (1.0 - s);
                dbx += xi * s;
            }
            let m0 = scale * dax * dax + lambda * daa;
            let m1 = scale * dax * dbx + lambda * dab;
            let m2 = scale * dbx * dbx + lambda * dbb;
            let det = m0 * m2 - m1 * m1;
            if det == 0.0 {
                return;
            }
            let a_opt = ((m2 * dax - m1 * dbx) / det) as f32;
            let b_opt = ((m0 * dbx - m1 * dax) / det) as f32;
            if (a - a_opt).abs() < 1e-8 && (b - b_opt).abs() < 1e-8 {
                return;
            }
            if !(b_opt > a_opt) {
                return;
            }
            // Coordinate descent does not always improve the loss; stop when it would regress.
            let loss = self.loss(x, [a_opt, b_opt], points, norm_sq);
            if loss > best_loss {
                return;
            }
            *interval = [a_opt, b_opt];
            best_loss = loss;
        }
    }

    fn loss(&self, x: &[f32], interval: [f32; 2], points: u32, norm_sq: f32) -> f64 {
        let a = interval[0] as f64;
        let b = interval[1] as f64;
        let step = (b - a) / (points as f64 - 1.0);
        let step_inv = 1.0 / step;
        let mut xe = 0.0f64;
        let mut e = 0.0f64;
        for &xi in x {
            let xi = xi as f64;
            let xiq = a + step * ((xi.max(a).min(b) - a) * step_inv).round();
            xe += xi * (xi - xiq);
            e += (xi - xiq) * (xi - xiq);
        }
        let lambda = self.lambda as f64;
        (1.0 - lambda) * xe * xe / norm_sq as f64 + lambda * e
    }
}

fn initial_interval(bits: u8, std: f64, mean: f64, min: f32, max: f32) -> [f32; 2] {
    let [lo, hi] = MINIMUM_MSE_GRID[bits as usize - 1];
    let min = min as f64;
    let max = max as f64;
    [
        (lo as f64 * std + mean).max(min).min(max) as f32,
        (hi as f64 * std + mean).max(min).min(max) as f32,
    ]
}

/// `f32::clamp` panics on `a > b`; quantization only needs the saturating form.
#[inline]
fn clamp(x: f32, a: f32, b: f32) -> f32 {
    x.max(a).min(b)
}
