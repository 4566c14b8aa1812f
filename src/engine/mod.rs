// Delta engine boundary.
//
// The container does not know how a raw patch is computed or applied; it
// hands source and target to a `DeltaEngine` and stores whatever bytes come
// back. `MatchBlocks` is the bundled engine; any other implementation of the
// trait can be plugged into the create/apply paths.

mod match_blocks;
mod rolling;

use thiserror::Error;

use crate::format::FORMAT_MATCH_BLOCKS;

pub use match_blocks::MatchBlocks;

/// Tuning passed to `compute_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaParams {
    /// Minimum score (equal minus differing bytes) for a match to be kept.
    pub match_score: u32,
    /// Source block granularity used for match lookup.
    pub match_block_size: usize,
    /// Raw patch format to produce; mirrors the container header's format.
    pub format_version: u8,
}

impl Default for DeltaParams {
    fn default() -> Self {
        Self {
            match_score: 6,
            match_block_size: 64,
            format_version: FORMAT_MATCH_BLOCKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("malformed raw patch: {0}")]
    Malformed(String),
    #[error("patched output is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("invalid delta parameter: {0}")]
    InvalidParams(String),
    #[error("unsupported raw patch format {0}")]
    UnsupportedFormat(u8),
}

/// Computes and applies raw (uncompressed) patches.
pub trait DeltaEngine {
    fn compute_delta(
        &self,
        source: &[u8],
        target: &[u8],
        params: &DeltaParams,
    ) -> Result<Vec<u8>, EngineError>;

    fn apply_delta(&self, source: &[u8], patch: &[u8]) -> Result<Vec<u8>, EngineError>;
}

impl<E: DeltaEngine + ?Sized> DeltaEngine for &E {
    fn compute_delta(
        &self,
        source: &[u8],
        target: &[u8],
        params: &DeltaParams,
    ) -> Result<Vec<u8>, EngineError> {
        (**self).compute_delta(source, target, params)
    }

    fn apply_delta(&self, source: &[u8], patch: &[u8]) -> Result<Vec<u8>, EngineError> {
        (**self).apply_delta(source, patch)
    }
}
