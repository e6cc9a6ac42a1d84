//! 1-bit × 4-bit dot product kernels.
//!
//! All kernels compute the raw quantized dot product
//!
//! ```text
//! ⟨k_d, k_q⟩ = Σ_j 2^j · popcount(k_d AND k_q^(j))
//! ```
//!
//! where `k_q^(j)` is bit plane `j` of the transposed query. The byte-wise
//! form is the reference; the word-wise forms read 64 bits at a time and
//! interleave the four planes so each record word is loaded once.

use bytemuck::pod_read_unaligned;

/// Whether this CPU can run [`PopcountKernel`].
pub fn accelerated_kernel_supported() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("popcnt")
    }
    #[cfg(target_arch = "aarch64")]
    {
        true
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        false
    }
}

/// Byte-wise reference kernel over a transposed query of `4 * record.len()` bytes.
pub fn int1_int4_dot_bytes(query: &[u8], record: &[u8]) -> u32 {
    let plane_len = record.len();
    debug_assert_eq!(query.len(), 4 * plane_len);
    let mut result = 0u32;
    for (j, plane) in query.chunks_exact(plane_len.max(1)).take(4).enumerate() {
        let pop: u32 = plane
            .iter()
            .zip(record)
            .map(|(q, d)| (q & d).count_ones())
            .sum();
        result += pop << j;
    }
    result
}

/// Capability token for the word-wise kernels.
///
/// Only obtainable through [`PopcountKernel::detect`], so holding one proves
/// the CPU features the kernels are compiled for are present.
#[derive(Copy, Clone, Debug)]
pub struct PopcountKernel {
    _detected: (),
}

impl PopcountKernel {
    pub fn detect() -> Option<Self> {
        accelerated_kernel_supported().then_some(Self { _detected: () })
    }

    /// Raw dot product of one record's packed bits against query words.
    ///
    /// `query` holds `4 * record.len() / 8` words, plane `j` at
    /// `[j * record.len() / 8 ..]`.
    pub fn dot(&self, query: &[u64], record: &[u8]) -> u32 {
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: `self` exists only if `popcnt` was detected.
            unsafe { dot_popcnt(query, record) }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            dot_words(query, record)
        }
    }

    /// Raw dot products of `ordinals` into `out`, four records per pass.
    ///
    /// Record `o` occupies `records[o * record_size ..][.. packed_len]`. Every
    /// ordinal must address a whole record.
    pub fn dot_bulk(
        &self,
        query: &[u64],
        records: &[u8],
        record_size: usize,
        packed_len: usize,
        ordinals: &[u32],
        out: &mut [f32],
    ) {
        debug_assert_eq!(ordinals.len(), out.len());
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: `self` exists only if `popcnt` was detected.
            unsafe { dot_bulk_popcnt(query, records, record_size, packed_len, ordinals, out) }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            dot_bulk_words(query, records, record_size, packed_len, ordinals, out)
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "popcnt")]
unsafe fn dot_popcnt(query: &[u64], record: &[u8]) -> u32 {
    dot_words(query, record)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "popcnt")]
unsafe fn dot_bulk_popcnt(
    query: &[u64],
    records: &[u8],
    record_size: usize,
    packed_len: usize,
    ordinals: &[u32],
    out: &mut [f32],
) {
    dot_bulk_words(query, records, record_size, packed_len, ordinals, out)
}

#[inline(always)]
fn planes(query: &[u64], words: usize) -> [&[u64]; 4] {
    debug_assert_eq!(query.len(), 4 * words);
    [
        &query[..words],
        &query[words..2 * words],
        &query[2 * words..3 * words],
        &query[3 * words..4 * words],
    ]
}

#[inline(always)]
fn dot_words(query: &[u64], record: &[u8]) -> u32 {
    let [p0, p1, p2, p3] = planes(query, record.len() / 8);
    let (mut pop0, mut pop1, mut pop2, mut pop3) = (0u32, 0u32, 0u32, 0u32);
    for (x_chunk, (((q0, q1), q2), q3)) in record
        .chunks_exact(8)
        .zip(p0.iter().zip(p1).zip(p2).zip(p3))
    {
        let x: u64 = pod_read_unaligned(x_chunk);
        pop0 += (x & q0).count_ones();
        pop1 += (x & q1).count_ones();
        pop2 += (x & q2).count_ones();
        pop3 += (x & q3).count_ones();
    }
    pop0 + (pop1 << 1) + (pop2 << 2) + (pop3 << 3)
}

#[inline(always)]
fn dot4_words(query: &[u64], records: [&[u8]; 4]) -> [u32; 4] {
    let words = records[0].len() / 8;
    let [p0, p1, p2, p3] = planes(query, words);
    let mut acc = [0u32; 4];
    for w in 0..words {
        let (q0, q1, q2, q3) = (p0[w], p1[w], p2[w], p3[w]);
        for (sum, record) in acc.iter_mut().zip(&records) {
            let x: u64 = pod_read_unaligned(&record[w * 8..w * 8 + 8]);
            *sum += (x & q0).count_ones()
                + ((x & q1).count_ones() << 1)
                + ((x & q2).count_ones() << 2)
                + ((x & q3).count_ones() << 3);
        }
    }
    acc
}

#[inline(always)]
fn dot_bulk_words(
    query: &[u64],
    records: &[u8],
    record_size: usize,
    packed_len: usize,
    ordinals: &[u32],
    out: &mut [f32],
) {
    let record = |ordinal: u32| {
        let start = ordinal as usize * record_size;
        &records[start..start + packed_len]
    };

    let mut ordinal_chunks = ordinals.chunks_exact(4);
    let mut out_chunks = out.chunks_exact_mut(4);
    for (ords, dst) in (&mut ordinal_chunks).zip(&mut out_chunks) {
        let dots = dot4_words(
            query,
            [record(ords[0]), record(ords[1]), record(ords[2]), record(ords[3])],
        );
        for (d, dot) in dst.iter_mut().zip(dots) {
            *d = dot as f32;
        }
    }
    for (&ordinal, d) in ordinal_chunks
        .remainder()
        .iter()
        .zip(out_chunks.into_remainder())
    {
        *d = dot_words(query, record(ordinal)) as f32;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn words_of(bytes: &[u8]) -> Vec<u64> {
        bytes
            .chunks_exact(8)
            .map(pod_read_unaligned::<u64>)
            .collect()
    }

    #[test]
    fn test_bytes_kernel_weights_planes() {
        // One record byte with the top bit set against a query whose first
        // component is 0b1011 → 1 + 2 + 8.
        let mut query = [0u8; 4];
        query[0] = 0b1000_0000;
        query[1] = 0b1000_0000;
        query[3] = 0b1000_0000;
        assert_eq!(int1_int4_dot_bytes(&query, &[0b1000_0000]), 11);
        assert_eq!(int1_int4_dot_bytes(&query, &[0b0111_1111]), 0);
    }

    #[test]
    fn test_word_kernels_match_bytes_kernel() {
        let Some(kernel) = PopcountKernel::detect() else {
            return;
        };
        let mut rng = StdRng::seed_from_u64(5);
        for packed_len in [8usize, 48, 128] {
            let record_size = packed_len + 14;
            let query: Vec<u8> = (0..4 * packed_len).map(|_| rng.gen()).collect();
            let records: Vec<u8> = (0..record_size * 11).map(|_| rng.gen()).collect();
            let words = words_of(&query);

            let ordinals: Vec<u32> = vec![3, 0, 10, 3, 7, 1, 2];
            let mut out = vec![0f32; ordinals.len()];
            kernel.dot_bulk(&words, &records, record_size, packed_len, &ordinals, &mut out);

            for (&ordinal, &bulk) in ordinals.iter().zip(&out) {
                let start = ordinal as usize * record_size;
                let record = &records[start..start + packed_len];
                let expected = int1_int4_dot_bytes(&query, record);
                assert_eq!(kernel.dot(&words, record), expected);
                assert_eq!(bulk, expected as f32);
            }
        }
    }
}
