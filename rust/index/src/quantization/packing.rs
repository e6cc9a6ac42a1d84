//! Bit packing for quantized components.
//!
//! Both layouts are most-significant-bit first: component `i` lands in bit
//! `7 - i % 8` of byte `i / 8`. Index and query vectors must agree on this
//! so that AND + popcount pairs up the same components.

/// Packs 1-bit components into `packed`, zero-filling any trailing bytes.
pub fn pack_as_binary(codes: &[u8], packed: &mut [u8]) {
    debug_assert!(packed.len() * 8 >= codes.len());
    packed.fill(0);
    for (byte_ref, chunk) in packed.iter_mut().zip(codes.chunks(8)) {
        let mut byte = 0u8;
        for (j, &k) in chunk.iter().enumerate() {
            debug_assert!(k <= 1, "1-bit component out of range: {k}");
            byte |= (k & 1) << (7 - j);
        }
        *byte_ref = byte;
    }
}

/// Splits 4-bit components into four bit planes.
///
/// Plane `j` holds bit `j` of every component and occupies
/// `out[j * out.len() / 4 .. (j + 1) * out.len() / 4]`.
pub fn transpose_half_byte(codes: &[u8], out: &mut [u8]) {
    debug_assert_eq!(out.len() % 4, 0);
    let plane = out.len() / 4;
    debug_assert!(plane * 8 >= codes.len());
    out.fill(0);
    for (byte_idx, chunk) in codes.chunks(8).enumerate() {
        let (mut b0, mut b1, mut b2, mut b3) = (0u8, 0u8, 0u8, 0u8);
        for (j, &k) in chunk.iter().enumerate() {
            debug_assert!(k <= 15, "4-bit component out of range: {k}");
            let shift = 7 - j;
            b0 |= (k & 1) << shift;
            b1 |= ((k >> 1) & 1) << shift;
            b2 |= ((k >> 2) & 1) << shift;
            b3 |= ((k >> 3) & 1) << shift;
        }
        out[byte_idx] = b0;
        out[plane + byte_idx] = b1;
        out[2 * plane + byte_idx] = b2;
        out[3 * plane + byte_idx] = b3;
    }
}

/// Inverse of [`pack_as_binary`] for the first `dims` components.
pub fn unpack_binary(packed: &[u8], dims: usize) -> Vec<u8> {
    (0..dims)
        .map(|i| (packed[i / 8] >> (7 - i % 8)) & 1)
        .collect()
}

/// Inverse of [`transpose_half_byte`] for the first `dims` components.
pub fn untranspose_half_byte(planes: &[u8], dims: usize) -> Vec<u8> {
    let plane = planes.len() / 4;
    (0..dims)
        .map(|i| {
            let shift = 7 - i % 8;
            (0..4).fold(0u8, |acc, j| {
                acc | (((planes[j * plane + i / 8] >> shift) & 1) << j)
            })
        })
        .collect()
}
