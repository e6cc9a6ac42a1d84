//! Call-scoped staging of kernel operands.
//!
//! The word-wise kernels take the query as `&[u64]`. A query encoding that
//! is already 8-byte aligned is reinterpreted in place; otherwise (or when
//! staging is forced) the query, ordinals and output go through buffers
//! owned by a [`Staging`] value that lives for a single scoring call.

use std::borrow::Cow;

/// Whether the query must be copied before the kernels can read it as words.
pub(crate) fn needs_staging(query: &[u8], force: bool) -> bool {
    force || bytemuck::try_cast_slice::<u8, u64>(query).is_err()
}

/// Query bytes as words, copying only when they cannot be cast in place.
pub(crate) fn query_words(query: &[u8], force: bool) -> Cow<'_, [u64]> {
    if !force {
        if let Ok(words) = bytemuck::try_cast_slice::<u8, u64>(query) {
            return Cow::Borrowed(words);
        }
    }
    Cow::Owned(copy_to_words(query))
}

fn copy_to_words(bytes: &[u8]) -> Vec<u64> {
    let mut words = vec![0u64; bytes.len().div_ceil(8)];
    bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
    words
}

/// Operands of one bulk call, staged into owned buffers.
pub(crate) struct Staging {
    query: Vec<u64>,
    ordinals: Vec<u32>,
    scores: Vec<f32>,
}

impl Staging {
    pub(crate) fn new(query: &[u8], ordinals: &[u32]) -> Self {
        Self {
            query: copy_to_words(query),
            ordinals: ordinals.to_vec(),
            scores: vec![0.0; ordinals.len()],
        }
    }

    /// Query words, staged ordinals and the output buffer, borrowed together.
    pub(crate) fn operands(&mut self) -> (&[u64], &[u32], &mut [f32]) {
        (
            self.query.as_slice(),
            self.ordinals.as_slice(),
            self.scores.as_mut_slice(),
        )
    }

    /// Copies staged results back into the caller's buffer.
    pub(crate) fn copy_scores_to(&self, scores: &mut [f32]) {
        scores.copy_from_slice(&self.scores);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_query_is_borrowed() {
        let words = vec![0x0102_0304_0506_0708u64, u64::MAX];
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        assert!(matches!(query_words(bytes, false), Cow::Borrowed(_)));
        assert!(!needs_staging(bytes, false));
        assert!(needs_staging(bytes, true));

        let forced = query_words(bytes, true);
        assert!(matches!(forced, Cow::Owned(_)));
        assert_eq!(forced.as_ref(), words.as_slice());
    }

    #[test]
    fn test_misaligned_query_is_staged() {
        let words = vec![7u64, 9u64, 11u64];
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        // Dropping the first byte shifts the slice off its 8-byte alignment.
        let shifted = &bytes[1..17];
        let staged = query_words(shifted, false);
        assert!(matches!(staged, Cow::Owned(_)));
        assert!(needs_staging(shifted, false));
        assert_eq!(bytemuck::cast_slice::<u64, u8>(&staged), shifted);
    }

    #[test]
    fn test_staging_round_trip() {
        let mut staging = Staging::new(&[0u8; 16], &[4, 2]);
        {
            let (query, ordinals, scores) = staging.operands();
            assert_eq!(query.len(), 2);
            assert_eq!(ordinals, &[4, 2]);
            scores.copy_from_slice(&[1.5, 2.5]);
        }
        let mut out = [0f32; 2];
        staging.copy_scores_to(&mut out);
        assert_eq!(out, [1.5, 2.5]);
    }
}
