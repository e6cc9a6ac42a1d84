mod scorer_helpers;

use bqscore_distance::{similarity, SimilarityKind};
use bqscore_index::{MemoryInput, QuantizedVectorScorer, ScorerConfig};
use scorer_helpers::{build_segment, relative_error};

const DIMS: usize = 384;
const NUM_VECTORS: usize = 200;
const NUM_QUERIES: usize = 4;

fn max_mean_error(kind: SimilarityKind) -> f32 {
    match kind {
        // Distances between clustered vectors are small, so their estimates
        // carry the largest relative error.
        SimilarityKind::Euclidean => 0.1,
        _ => 0.02,
    }
}

/// Quantized scores track the exact similarity of the original vectors.
#[test]
fn test_scores_track_exact_similarity() {
    for kind in SimilarityKind::ALL {
        let segment = build_segment(31, DIMS, NUM_VECTORS, kind, 0.3);
        let mut scorer = QuantizedVectorScorer::new(
            MemoryInput::new(segment.bytes.clone()),
            segment.centroid.clone(),
            kind,
            &ScorerConfig::default(),
        )
        .unwrap();
        let ordinals: Vec<u32> = (0..NUM_VECTORS as u32).collect();

        let mut total_error = 0.0f32;
        for query in segment.vectors.iter().step_by(NUM_VECTORS / NUM_QUERIES) {
            scorer.set_query(query).unwrap();
            let mut scores = vec![0f32; NUM_VECTORS];
            scorer
                .bulk_score(&ordinals, &mut scores, NUM_VECTORS)
                .unwrap();
            for (vector, &score) in segment.vectors.iter().zip(&scores) {
                let exact = similarity(kind, query, vector);
                assert!(score.is_finite() && score >= 0.0, "{kind}: score {score}");
                total_error += relative_error(exact, score);
            }
        }

        let mean_error = total_error / (NUM_QUERIES * NUM_VECTORS) as f32;
        assert!(
            mean_error <= max_mean_error(kind),
            "{kind}: mean relative error {mean_error}"
        );
    }
}
