use bqscore_distance::SimilarityKind;
use tracing::instrument;

use super::kernels::int1_int4_dot_bytes;
use super::{
    check_batch, check_ordinal, check_ordinals, check_query, BinaryQuantizedScorer, ScorerError,
};
use crate::input::IndexInput;
use crate::quantization::{apply_corrections, QuantizationResult, QuantizedQuery};
use crate::record::RecordLayout;

/// Portable scorer that reads each record through the input cursor.
pub struct ScalarScorer<I> {
    input: I,
    layout: RecordLayout,
    count: usize,
    // Packed bits of the record being scored.
    bits: Vec<u8>,
}

impl<I: IndexInput> ScalarScorer<I> {
    pub fn new(input: I, dims: usize) -> Result<Self, ScorerError> {
        let layout = RecordLayout::new(dims);
        let count = layout.record_count(input.len())?;
        Ok(Self {
            input,
            layout,
            count,
            bits: vec![0u8; layout.packed_len()],
        })
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Reads record `ordinal` into the scratch buffer and returns its corrections.
    fn read_record(&mut self, ordinal: u32) -> Result<QuantizationResult, ScorerError> {
        check_ordinal(ordinal, self.count)?;
        self.input.seek(self.layout.offset(ordinal))?;
        self.input.read_bytes(&mut self.bits)?;
        Ok(QuantizationResult {
            lower_interval: self.input.read_f32_le()?,
            upper_interval: self.input.read_f32_le()?,
            additional_correction: self.input.read_f32_le()?,
            quantized_component_sum: self.input.read_u16_le()? as u32,
        })
    }

    fn score_record(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinal: u32,
    ) -> Result<f32, ScorerError> {
        let index = self.read_record(ordinal)?;
        let qc_dist = int1_int4_dot_bytes(query.bits(), &self.bits);
        Ok(apply_corrections(
            self.layout.dims(),
            similarity,
            centroid_dp,
            qc_dist as f32,
            query.corrections(),
            &index,
        ))
    }
}

impl<I: IndexInput> BinaryQuantizedScorer for ScalarScorer<I> {
    fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    fn record_count(&self) -> usize {
        self.count
    }

    fn score(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinal: u32,
    ) -> Result<f32, ScorerError> {
        check_query(&self.layout, query)?;
        self.score_record(query, similarity, centroid_dp, ordinal)
    }

    #[instrument(skip(self, query, ordinals, scores), level = "trace")]
    fn score_bulk(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinals: &[u32],
        scores: &mut [f32],
        count: usize,
    ) -> Result<f32, ScorerError> {
        check_batch(ordinals, scores, count)?;
        check_query(&self.layout, query)?;
        let ordinals = &ordinals[..count];
        check_ordinals(ordinals, self.count)?;
        let mut max = f32::NEG_INFINITY;
        for (&ordinal, score) in ordinals.iter().zip(&mut scores[..count]) {
            *score = self.score_record(query, similarity, centroid_dp, ordinal)?;
            max = max.max(*score);
        }
        Ok(max)
    }
}
