//! Builds encoded segments from seeded random vectors.
#![allow(dead_code)]

use std::sync::Arc;

use bqscore_distance::{normalize, SimilarityKind};
use bqscore_index::{centroid_dp, OptimizedScalarQuantizer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct TestSegment {
    pub dims: usize,
    pub similarity: SimilarityKind,
    pub centroid: Arc<[f32]>,
    pub centroid_dp: f32,
    pub vectors: Vec<Vec<f32>>,
    /// Encoded records, back to back.
    pub bytes: Vec<u8>,
}

impl TestSegment {
    pub fn quantizer(&self) -> OptimizedScalarQuantizer {
        OptimizedScalarQuantizer::new(self.similarity)
    }
}

pub fn random_vector(rng: &mut StdRng, dims: usize, similarity: SimilarityKind) -> Vec<f32> {
    let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
    match similarity {
        SimilarityKind::Cosine => normalize(&v),
        _ => v,
    }
}

/// Vectors spread `spread` around a random centroid.
pub fn build_segment(
    seed: u64,
    dims: usize,
    count: usize,
    similarity: SimilarityKind,
    spread: f32,
) -> TestSegment {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = random_vector(&mut rng, dims, SimilarityKind::Euclidean);
    let vectors: Vec<Vec<f32>> = (0..count)
        .map(|_| {
            let v: Vec<f32> = base
                .iter()
                .map(|b| b + spread * rng.gen_range(-1.0f32..1.0))
                .collect();
            match similarity {
                SimilarityKind::Cosine => normalize(&v),
                _ => v,
            }
        })
        .collect();

    // Centroid is the mean of the segment's vectors.
    let mut centroid = vec![0.0f32; dims];
    for v in &vectors {
        for (c, x) in centroid.iter_mut().zip(v) {
            *c += x / count as f32;
        }
    }

    let quantizer = OptimizedScalarQuantizer::new(similarity);
    let mut bytes = Vec::new();
    for v in &vectors {
        let record = quantizer
            .encode_index_vector(v, &centroid)
            .expect("encode index vector");
        bytes.extend_from_slice(&record.to_bytes());
    }

    TestSegment {
        dims,
        similarity,
        centroid_dp: centroid_dp(&centroid),
        centroid: centroid.into(),
        vectors,
        bytes,
    }
}

pub fn relative_error(expected: f32, actual: f32) -> f32 {
    (expected - actual).abs() / expected.abs().max(f32::EPSILON)
}
