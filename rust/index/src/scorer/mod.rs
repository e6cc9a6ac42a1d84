//! Scoring of 4-bit queries against 1-bit index records.
//!
//! | Scorer | Reads records via | Raw dot product |
//! |--------|-------------------|-----------------|
//! | [`ScalarScorer`] | seek + read on any [`IndexInput`](crate::input::IndexInput) | byte-wise, per record |
//! | [`AcceleratedScorer`] | zero-copy [`SegmentAccess`] views | word-wise, four records per pass in bulk |
//!
//! Both produce the raw dot product and hand it to
//! [`apply_corrections`](crate::quantization::apply_corrections), so their
//! scores agree up to float rounding. The accelerated scorer falls back to
//! its scalar scorer whenever the input cannot provide a segment.

pub mod accelerated;
pub mod kernels;
pub mod scalar;
mod staging;

use std::io;

use bqscore_distance::SimilarityKind;
use bqscore_error::{ErrorCodes, ScoringError};
use thiserror::Error;

pub use accelerated::AcceleratedScorer;
pub use scalar::ScalarScorer;

use crate::config::{ScorerConfig, ScorerImplementation};
use crate::input::SegmentAccess;
use crate::quantization::{QuantizationError, QuantizedQuery};
use crate::record::RecordLayout;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Failed to read record data: {0}")]
    ReadFailure(#[from] io::Error),
    #[error("Ordinal {ordinal} out of range for {count} records")]
    OrdinalOutOfRange { ordinal: u32, count: usize },
    #[error("Query encoding has {got} bytes, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("No query has been set")]
    QueryNotSet,
    #[error("Batch of {count} exceeds buffer capacity {capacity}")]
    BatchTooLarge { count: usize, capacity: usize },
    #[error("Input of {len} bytes is not a whole number of {record_size}-byte records")]
    TruncatedInput { len: u64, record_size: usize },
    #[error("Accelerated scoring is not supported on this CPU")]
    AcceleratedUnsupported,
    #[error(transparent)]
    Quantization(#[from] QuantizationError),
}

impl ScoringError for ScorerError {
    fn code(&self) -> ErrorCodes {
        match self {
            ScorerError::ReadFailure(e) => e.code(),
            ScorerError::OrdinalOutOfRange { .. } => ErrorCodes::OutOfRange,
            ScorerError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
            ScorerError::QueryNotSet => ErrorCodes::FailedPrecondition,
            ScorerError::BatchTooLarge { .. } => ErrorCodes::InvalidArgument,
            ScorerError::TruncatedInput { .. } => ErrorCodes::DataLoss,
            ScorerError::AcceleratedUnsupported => ErrorCodes::Unimplemented,
            ScorerError::Quantization(e) => e.code(),
        }
    }
}

/// Scores quantized queries against the records of one input.
///
/// Scoring takes `&mut self`: a scorer owns its input cursor and buffers, so
/// concurrent scoring uses one scorer per thread.
pub trait BinaryQuantizedScorer {
    fn layout(&self) -> &RecordLayout;

    /// Number of records in the input.
    fn record_count(&self) -> usize;

    fn score(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinal: u32,
    ) -> Result<f32, ScorerError>;

    /// Scores `ordinals[..count]` into `scores[..count]` and returns the
    /// maximum, or `-∞` when `count` is zero.
    fn score_bulk(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinals: &[u32],
        scores: &mut [f32],
        count: usize,
    ) -> Result<f32, ScorerError>;
}

// ── Shared checks ─────────────────────────────────────────────────────────────

pub(crate) fn check_query(layout: &RecordLayout, query: &QuantizedQuery) -> Result<(), ScorerError> {
    if query.bits().len() != layout.query_len() {
        return Err(ScorerError::DimensionMismatch {
            expected: layout.query_len(),
            got: query.bits().len(),
        });
    }
    Ok(())
}

pub(crate) fn check_ordinal(ordinal: u32, count: usize) -> Result<(), ScorerError> {
    if ordinal as usize >= count {
        return Err(ScorerError::OrdinalOutOfRange { ordinal, count });
    }
    Ok(())
}

/// Checks a whole batch up front so a failing call leaves `scores` untouched.
pub(crate) fn check_ordinals(ordinals: &[u32], count: usize) -> Result<(), ScorerError> {
    ordinals
        .iter()
        .try_for_each(|&ordinal| check_ordinal(ordinal, count))
}

pub(crate) fn check_batch(ordinals: &[u32], scores: &[f32], count: usize) -> Result<(), ScorerError> {
    let capacity = ordinals.len().min(scores.len());
    if count > capacity {
        return Err(ScorerError::BatchTooLarge { count, capacity });
    }
    Ok(())
}

// ── Selection ─────────────────────────────────────────────────────────────────

/// The scorer chosen for an input, decided once at construction.
pub enum VectorScorer<I: SegmentAccess> {
    Scalar(ScalarScorer<I>),
    Accelerated(AcceleratedScorer<I>),
}

impl<I: SegmentAccess> VectorScorer<I> {
    pub fn new(input: I, dims: usize, config: &ScorerConfig) -> Result<Self, ScorerError> {
        let scorer = match config.implementation {
            ScorerImplementation::Scalar => {
                tracing::debug!(dims, "Using scalar scorer: configured");
                Self::Scalar(ScalarScorer::new(input, dims)?)
            }
            ScorerImplementation::Accelerated => {
                tracing::debug!(dims, "Using accelerated scorer: configured");
                Self::Accelerated(AcceleratedScorer::new(input, dims, config.force_staging)?)
            }
            ScorerImplementation::Auto => {
                if !kernels::accelerated_kernel_supported() {
                    tracing::debug!(dims, "Using scalar scorer: no kernel support on this CPU");
                    Self::Scalar(ScalarScorer::new(input, dims)?)
                } else if input.segment_slice(0, input.len()).is_none() {
                    tracing::debug!(dims, "Using scalar scorer: input has no contiguous segment");
                    Self::Scalar(ScalarScorer::new(input, dims)?)
                } else {
                    tracing::debug!(dims, "Using accelerated scorer");
                    Self::Accelerated(AcceleratedScorer::new(input, dims, config.force_staging)?)
                }
            }
        };
        Ok(scorer)
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, Self::Accelerated(_))
    }
}

impl<I: SegmentAccess> BinaryQuantizedScorer for VectorScorer<I> {
    fn layout(&self) -> &RecordLayout {
        match self {
            Self::Scalar(s) => s.layout(),
            Self::Accelerated(s) => s.layout(),
        }
    }

    fn record_count(&self) -> usize {
        match self {
            Self::Scalar(s) => s.record_count(),
            Self::Accelerated(s) => s.record_count(),
        }
    }

    fn score(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinal: u32,
    ) -> Result<f32, ScorerError> {
        match self {
            Self::Scalar(s) => s.score(query, similarity, centroid_dp, ordinal),
            Self::Accelerated(s) => s.score(query, similarity, centroid_dp, ordinal),
        }
    }

    fn score_bulk(
        &mut self,
        query: &QuantizedQuery,
        similarity: SimilarityKind,
        centroid_dp: f32,
        ordinals: &[u32],
        scores: &mut [f32],
        count: usize,
    ) -> Result<f32, ScorerError> {
        match self {
            Self::Scalar(s) => s.score_bulk(query, similarity, centroid_dp, ordinals, scores, count),
            Self::Accelerated(s) => {
                s.score_bulk(query, similarity, centroid_dp, ordinals, scores, count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{FileInput, MemoryInput, PagedInput};

    #[test]
    fn test_selection() {
        let layout = RecordLayout::new(64);
        let bytes = vec![0u8; layout.record_size() * 4];

        let scalar = ScorerConfig {
            implementation: ScorerImplementation::Scalar,
            ..Default::default()
        };
        let scorer = VectorScorer::new(MemoryInput::new(bytes.clone()), 64, &scalar).unwrap();
        assert!(!scorer.is_accelerated());
        assert_eq!(scorer.record_count(), 4);

        let auto = ScorerConfig::default();
        let scorer = VectorScorer::new(MemoryInput::new(bytes.clone()), 64, &auto).unwrap();
        assert_eq!(scorer.is_accelerated(), kernels::accelerated_kernel_supported());

        let scorer =
            VectorScorer::new(PagedInput::without_segments(bytes.clone()), 64, &auto).unwrap();
        assert!(!scorer.is_accelerated());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &bytes).unwrap();
        let scorer = VectorScorer::new(FileInput::open(file.path()).unwrap(), 64, &auto).unwrap();
        assert!(!scorer.is_accelerated());

        let accelerated = ScorerConfig {
            implementation: ScorerImplementation::Accelerated,
            ..Default::default()
        };
        let result = VectorScorer::new(MemoryInput::new(bytes), 64, &accelerated);
        if kernels::accelerated_kernel_supported() {
            assert!(result.unwrap().is_accelerated());
        } else {
            assert!(matches!(result, Err(ScorerError::AcceleratedUnsupported)));
        }
    }

    #[test]
    fn test_truncated_input() {
        let layout = RecordLayout::new(64);
        let bytes = vec![0u8; layout.record_size() * 2 + 3];
        let result = VectorScorer::new(MemoryInput::new(bytes), 64, &ScorerConfig::default());
        let Err(err) = result else {
            panic!("expected truncated input error");
        };
        assert!(matches!(err, ScorerError::TruncatedInput { .. }));
        assert_eq!(err.code(), ErrorCodes::DataLoss);
    }

    #[test]
    fn test_batch_policy() {
        assert!(check_batch(&[1, 2, 3], &[0.0; 3], 3).is_ok());
        assert!(matches!(
            check_batch(&[1, 2, 3], &[0.0; 2], 3),
            Err(ScorerError::BatchTooLarge {
                count: 3,
                capacity: 2
            })
        ));
    }
}
