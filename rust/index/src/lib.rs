pub mod config;
pub mod input;
pub mod quantization;
mod query_scorer;
pub mod record;
pub mod scorer;

// Re-export types

pub use config::*;
pub use input::{FileInput, IndexInput, MemoryInput, PagedInput, SegmentAccess};
pub use quantization::{
    apply_corrections, centroid_dp, OptimizedScalarQuantizer, QuantizationError,
    QuantizationResult, QuantizedQuery,
};
pub use query_scorer::*;
pub use record::{EncodedRecord, RecordLayout};
pub use scorer::{
    AcceleratedScorer, BinaryQuantizedScorer, ScalarScorer, ScorerError, VectorScorer,
};
