use std::sync::Arc;

use bqscore_distance::SimilarityKind;

use crate::config::ScorerConfig;
use crate::input::SegmentAccess;
use crate::quantization::{
    centroid_dp, OptimizedScalarQuantizer, QuantizationError, QuantizedQuery,
};
use crate::record::RecordLayout;
use crate::scorer::{check_query, BinaryQuantizedScorer, ScorerError, VectorScorer};

/// Scores one query at a time against the records of a segment.
///
/// Binds the segment centroid, its similarity and the selected
/// [`VectorScorer`]. A query is encoded once by [`Self::set_query`] and
/// reused by every following `score` / `bulk_score` call.
pub struct QuantizedVectorScorer<I: SegmentAccess> {
    scorer: VectorScorer<I>,
    quantizer: OptimizedScalarQuantizer,
    centroid: Arc<[f32]>,
    centroid_dp: f32,
    query: Option<QuantizedQuery>,
}

impl<I: SegmentAccess> QuantizedVectorScorer<I> {
    pub fn new(
        input: I,
        centroid: Arc<[f32]>,
        similarity: SimilarityKind,
        config: &ScorerConfig,
    ) -> Result<Self, ScorerError> {
        let dims = centroid.len();
        if dims > RecordLayout::MAX_DIMS {
            return Err(QuantizationError::TooManyDimensions {
                dims,
                max: RecordLayout::MAX_DIMS,
            }
            .into());
        }
        let scorer = VectorScorer::new(input, dims, config)?;
        Ok(Self {
            scorer,
            quantizer: OptimizedScalarQuantizer::from_config(similarity, &config.quantizer),
            centroid_dp: centroid_dp(&centroid),
            centroid,
            query: None,
        })
    }

    pub fn similarity(&self) -> SimilarityKind {
        self.quantizer.similarity()
    }

    pub fn centroid(&self) -> &Arc<[f32]> {
        &self.centroid
    }

    pub fn centroid_dp(&self) -> f32 {
        self.centroid_dp
    }

    pub fn scorer(&self) -> &VectorScorer<I> {
        &self.scorer
    }

    /// Number of records; valid ordinals are `0..max_ordinal()`.
    pub fn max_ordinal(&self) -> usize {
        self.scorer.record_count()
    }

    /// Encodes `vector` as the current query.
    ///
    /// On error the previous query, if any, is kept.
    pub fn set_query(&mut self, vector: &[f32]) -> Result<(), ScorerError> {
        let query = self.quantizer.encode_query(vector, &self.centroid)?;
        self.query = Some(query);
        Ok(())
    }

    /// Uses an already encoded query, e.g. one produced at write time.
    pub fn set_query_encoding(&mut self, query: QuantizedQuery) -> Result<(), ScorerError> {
        check_query(self.scorer.layout(), &query)?;
        self.query = Some(query);
        Ok(())
    }

    pub fn query(&self) -> Option<&QuantizedQuery> {
        self.query.as_ref()
    }

    pub fn score(&mut self, ordinal: u32) -> Result<f32, ScorerError> {
        let query = self.query.as_ref().ok_or(ScorerError::QueryNotSet)?;
        self.scorer
            .score(query, self.quantizer.similarity(), self.centroid_dp, ordinal)
    }

    pub fn bulk_score(
        &mut self,
        ordinals: &[u32],
        scores: &mut [f32],
        count: usize,
    ) -> Result<f32, ScorerError> {
        let query = self.query.as_ref().ok_or(ScorerError::QueryNotSet)?;
        self.scorer.score_bulk(
            query,
            self.quantizer.similarity(),
            self.centroid_dp,
            ordinals,
            scores,
            count,
        )
    }
}

#[cfg(test)]
mod tests {
    use bqscore_error::{ErrorCodes, ScoringError};

    use super::*;
    use crate::input::MemoryInput;
    use crate::quantization::QuantizationResult;

    fn scorer() -> QuantizedVectorScorer<MemoryInput> {
        let centroid: Arc<[f32]> = vec![0.0f32; 8].into();
        let quantizer = OptimizedScalarQuantizer::new(SimilarityKind::Cosine);
        let mut bytes = Vec::new();
        for v in [
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ] {
            let record = quantizer.encode_index_vector(&v, &centroid).unwrap();
            bytes.extend_from_slice(&record.to_bytes());
        }
        QuantizedVectorScorer::new(
            MemoryInput::new(bytes),
            centroid,
            SimilarityKind::Cosine,
            &ScorerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_score_requires_query() {
        let mut scorer = scorer();
        assert_eq!(scorer.max_ordinal(), 2);
        let err = scorer.score(0).unwrap_err();
        assert!(matches!(err, ScorerError::QueryNotSet));
        assert_eq!(err.code(), ErrorCodes::FailedPrecondition);
        assert!(matches!(
            scorer.bulk_score(&[0, 1], &mut [0.0; 2], 2),
            Err(ScorerError::QueryNotSet)
        ));

        scorer
            .set_query(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        let mut scores = [0f32; 2];
        let max = scorer.bulk_score(&[0, 1], &mut scores, 2).unwrap();
        assert_eq!(max, scores[0].max(scores[1]));
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_invalid_queries_keep_previous() {
        let mut scorer = scorer();
        scorer
            .set_query(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap();
        let before = scorer.query().cloned();

        let err = scorer.set_query(&[2.0; 8]).unwrap_err();
        assert!(matches!(
            err,
            ScorerError::Quantization(QuantizationError::NotUnitVector { .. })
        ));
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
        assert!(matches!(
            scorer.set_query(&[1.0; 4]),
            Err(ScorerError::Quantization(
                QuantizationError::DimensionMismatch { .. }
            ))
        ));
        let corrections = QuantizationResult {
            lower_interval: 0.0,
            upper_interval: 0.0,
            additional_correction: 0.0,
            quantized_component_sum: 0,
        };
        assert!(matches!(
            scorer.set_query_encoding(QuantizedQuery::new(vec![0u8; 3], corrections)),
            Err(ScorerError::DimensionMismatch { .. })
        ));
        assert_eq!(scorer.query().cloned(), before);
    }
}
