use bqscore_distance::SimilarityKind;
use tracing::instrument;

use super::kernels::PopcountKernel;
use super::staging::{needs_staging, query_words, Staging};
use super::{
    check_batch, check_ordinal, check_ordinals, check_query, BinaryQuantizedScorer, ScalarScorer,
    ScorerError,
};
use crate::input::SegmentAccess;
use crate::quantization::{apply_corrections, QuantizedQuery};
use crate::record::{RecordLayout, RecordView, SegmentView};

/// Scores directly on memory-mapped records with the word-wise kernels.
///
/// Each call asks the input for a segment covering the records it needs;
/// when the input cannot provide one the call is served by the wrapped
/// [`ScalarScorer`] instead.
pub struct AcceleratedScorer<I> {
    inner: ScalarScorer<I>,
    kernel: PopcountKernel,
    force_staging: bool,
}

impl<I: SegmentAccess> AcceleratedScorer<I> {
    pub fn new(input: I, dims: usize, force_staging: bool) -> Result<Self, ScorerError> {
        let kernel = PopcountKernel::detect().ok_or(ScorerError::AcceleratedUnsupported)?;
        Ok(Self {
            inner: ScalarScorer::new(input, dims)?,
            kernel,
            force_staging,
        })
    }

    pub fn input(&self) -> &I {
        self.inner.input()
    }
}

impl<I: SegmentAccess> BinaryQuantizedScorer for AcceleratedScorer<I> {
    fn layout(&self) -> &RecordLayout {
        self.inner.layout()
    }

    fn record_count(&self) -> usize {
        self.inner.record_count()
    }

    fn score(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinal: u32,
    ) -> Result<f32, ScorerError> {
        let layout = *self.inner.layout();
        check_query(&layout, query)?;
        check_ordinal(ordinal, self.inner.record_count())?;

        let segment = self
            .inner
            .input()
            .segment_slice(layout.offset(ordinal), layout.record_size() as u64);
        let Some(bytes) = segment else {
            tracing::trace!(ordinal, "No segment for record, scoring with scalar path");
            return self.inner.score(query, similarity, centroid_dp, ordinal);
        };

        let record = RecordView::new(&layout, bytes)?;
        let words = query_words(query.bits(), self.force_staging);
        let qc_dist = self.kernel.dot(&words, record.bits());
        Ok(apply_corrections(
            layout.dims(),
            similarity,
            centroid_dp,
            qc_dist as f32,
            query.corrections(),
            &record.corrections(),
        ))
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
        let layout = *self.inner.layout();
        check_batch(ordinals, scores, count)?;
        check_query(&layout, query)?;
        let ordinals = &ordinals[..count];
        check_ordinals(ordinals, self.inner.record_count())?;
        if count == 0 {
            return Ok(f32::NEG_INFINITY);
        }
        let scores = &mut scores[..count];

        let input = self.inner.input();
        let Some(bytes) = input.segment_slice(0, input.len()) else {
            tracing::trace!(count, "No segment for input, scoring with scalar path");
            return self
                .inner
                .score_bulk(query, similarity, centroid_dp, ordinals, scores, count);
        };
        let segment = SegmentView::new(layout, bytes);

        // Pass 1: raw dot products.
        if needs_staging(query.bits(), self.force_staging) {
            tracing::trace!(count, "Staging bulk operands");
            let mut staging = Staging::new(query.bits(), ordinals);
            let (staged_query, staged_ordinals, staged_scores) = staging.operands();
            self.kernel.dot_bulk(
                staged_query,
                segment.bytes(),
                layout.record_size(),
                layout.packed_len(),
                staged_ordinals,
                staged_scores,
            );
            staging.copy_scores_to(scores);
        } else {
            self.kernel.dot_bulk(
                &query_words(query.bits(), false),
                segment.bytes(),
                layout.record_size(),
                layout.packed_len(),
                ordinals,
                scores,
            );
        }

        // Pass 2: corrections.
        let mut max = f32::NEG_INFINITY;
        for (&ordinal, score) in ordinals.iter().zip(scores.iter_mut()) {
            let index = segment.record(ordinal)?.corrections();
            *score = apply_corrections(
                layout.dims(),
                similarity,
                centroid_dp,
                *score,
                query.corrections(),
                &index,
            );
            max = max.max(*score);
        }
        Ok(max)
    }
}
