//! On-disk layout of quantized index vectors.
//!
//! Records are fixed-size and stored back to back, so record `i` starts at
//! byte `i * record_size`:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | `0` | `packed_len` | 1-bit codes, MSB-first, zero-padded to a 64-bit boundary |
//! | `packed_len` | 4 | `lower_interval` (f32 LE) |
//! | `packed_len + 4` | 4 | `upper_interval` (f32 LE) |
//! | `packed_len + 8` | 4 | `additional_correction` (f32 LE) |
//! | `packed_len + 12` | 2 | `quantized_component_sum` (u16 LE) |

use crate::quantization::{discretize, QuantizationResult};
use crate::scorer::ScorerError;

/// Bytes of correction terms following the packed codes.
pub const TRAILER_BYTES: usize = 3 * size_of::<f32>() + size_of::<u16>();

/// Sizes and offsets derived from the vector dimensionality.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    dims: usize,
    packed_len: usize,
}

impl RecordLayout {
    /// The component sum is stored as a u16.
    pub const MAX_DIMS: usize = u16::MAX as usize;

    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            packed_len: discretize(dims, 64) / 8,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Bytes of 1-bit codes per record.
    pub fn packed_len(&self) -> usize {
        self.packed_len
    }

    pub fn record_size(&self) -> usize {
        self.packed_len + TRAILER_BYTES
    }

    /// Bytes of a transposed 4-bit query encoding.
    pub fn query_len(&self) -> usize {
        4 * self.packed_len
    }

    /// Byte offset of record `ordinal`.
    pub fn offset(&self, ordinal: u32) -> u64 {
        ordinal as u64 * self.record_size() as u64
    }

    /// Number of whole records in `len` bytes.
    pub fn record_count(&self, len: u64) -> Result<usize, ScorerError> {
        let record_size = self.record_size() as u64;
        if len % record_size != 0 {
            return Err(ScorerError::TruncatedInput {
                len,
                record_size: self.record_size(),
            });
        }
        Ok((len / record_size) as usize)
    }
}

/// Decodes the correction trailer of a record.
pub fn read_trailer(trailer: &[u8]) -> QuantizationResult {
    debug_assert_eq!(trailer.len(), TRAILER_BYTES);
    let f32_at = |at: usize| {
        f32::from_le_bytes([trailer[at], trailer[at + 1], trailer[at + 2], trailer[at + 3]])
    };
    QuantizationResult {
        lower_interval: f32_at(0),
        upper_interval: f32_at(4),
        additional_correction: f32_at(8),
        quantized_component_sum: u16::from_le_bytes([trailer[12], trailer[13]]) as u32,
    }
}

fn write_trailer(corrections: &QuantizationResult, trailer: &mut [u8]) {
    trailer[0..4].copy_from_slice(&corrections.lower_interval.to_le_bytes());
    trailer[4..8].copy_from_slice(&corrections.upper_interval.to_le_bytes());
    trailer[8..12].copy_from_slice(&corrections.additional_correction.to_le_bytes());
    trailer[12..14].copy_from_slice(&(corrections.quantized_component_sum as u16).to_le_bytes());
}

/// An owned, encoded index vector.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedRecord {
    bits: Vec<u8>,
    corrections: QuantizationResult,
}

impl EncodedRecord {
    pub fn new(bits: Vec<u8>, corrections: QuantizationResult) -> Self {
        debug_assert!(corrections.quantized_component_sum <= u16::MAX as u32);
        Self { bits, corrections }
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn corrections(&self) -> &QuantizationResult {
        &self.corrections
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.bits.len() + TRAILER_BYTES
    }

    /// Writes the record into `out`, which must be exactly [`Self::size`] bytes.
    pub fn write_to(&self, out: &mut [u8]) {
        let (bits, trailer) = out.split_at_mut(self.bits.len());
        bits.copy_from_slice(&self.bits);
        write_trailer(&self.corrections, trailer);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size()];
        self.write_to(&mut out);
        out
    }

    pub fn from_bytes(layout: &RecordLayout, bytes: &[u8]) -> Result<Self, ScorerError> {
        let view = RecordView::new(layout, bytes)?;
        Ok(Self {
            bits: view.bits().to_vec(),
            corrections: view.corrections(),
        })
    }
}

/// A bounds-checked, borrowed view of one record.
#[derive(Copy, Clone, Debug)]
pub struct RecordView<'a> {
    bits: &'a [u8],
    trailer: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub fn new(layout: &RecordLayout, bytes: &'a [u8]) -> Result<Self, ScorerError> {
        if bytes.len() != layout.record_size() {
            return Err(ScorerError::TruncatedInput {
                len: bytes.len() as u64,
                record_size: layout.record_size(),
            });
        }
        let (bits, trailer) = bytes.split_at(layout.packed_len());
        Ok(Self { bits, trailer })
    }

    pub fn bits(&self) -> &'a [u8] {
        self.bits
    }

    pub fn corrections(&self) -> QuantizationResult {
        read_trailer(self.trailer)
    }
}

/// Record-addressed view over a contiguous byte range of records.
#[derive(Copy, Clone, Debug)]
pub struct SegmentView<'a> {
    layout: RecordLayout,
    bytes: &'a [u8],
}

impl<'a> SegmentView<'a> {
    pub fn new(layout: RecordLayout, bytes: &'a [u8]) -> Self {
        Self { layout, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / self.layout.record_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn record(&self, ordinal: u32) -> Result<RecordView<'a>, ScorerError> {
        let start = self.layout.offset(ordinal) as usize;
        let end = start + self.layout.record_size();
        let bytes = self
            .bytes
            .get(start..end)
            .ok_or(ScorerError::OrdinalOutOfRange {
                ordinal,
                count: self.len(),
            })?;
        RecordView::new(&self.layout, bytes)
    }
}
