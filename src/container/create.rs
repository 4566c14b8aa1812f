// Container assembly.

use std::io::Write;
use std::time::Instant;

use log::info;

use crate::codec::{CodecOptions, Compression};
use crate::engine::{DeltaEngine, DeltaParams, MatchBlocks};
use crate::error::{Error, Result};
use crate::format::{FORMAT_MATCH_BLOCKS, PatchHeader, varsize};

/// Options for `create_patch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOptions {
    pub compression: Compression,
    /// Forwarded to the delta engine.
    pub match_score: u32,
    /// Forwarded to the delta engine.
    pub match_block_size: usize,
    pub codec: CodecOptions,
}

impl Default for CreateOptions {
    fn default() -> Self {
        let delta = DeltaParams::default();
        Self {
            compression: Compression::default(),
            match_score: delta.match_score,
            match_block_size: delta.match_block_size,
            codec: CodecOptions::default(),
        }
    }
}

impl CreateOptions {
    pub fn with_compression(compression: Compression) -> Self {
        Self {
            compression,
            ..Self::default()
        }
    }

    pub fn delta_params(&self) -> DeltaParams {
        DeltaParams {
            match_score: self.match_score,
            match_block_size: self.match_block_size,
            format_version: FORMAT_MATCH_BLOCKS,
        }
    }
}

/// Sizes of what `create_patch` wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateStats {
    pub target_size: u64,
    /// Uncompressed engine output; 0 for an empty target.
    pub raw_patch_size: u64,
    /// Compressed engine output.
    pub payload_size: u64,
    /// Whole container, header included.
    pub patch_size: u64,
}

/// Write a patch turning `source` into `target` using the bundled engine.
pub fn create_patch<W: Write + ?Sized>(
    source: &[u8],
    target: &[u8],
    out: &mut W,
    opts: &CreateOptions,
) -> Result<CreateStats> {
    create_patch_with(&MatchBlocks, source, target, out, opts)
}

/// Write a patch using a caller-supplied delta engine.
pub fn create_patch_with<E: DeltaEngine + ?Sized, W: Write + ?Sized>(
    engine: &E,
    source: &[u8],
    target: &[u8],
    out: &mut W,
    opts: &CreateOptions,
) -> Result<CreateStats> {
    // Build the compressor up front so bad codec options fail before any work.
    let mut compressor = opts.compression.compressor(&opts.codec)?;
    let header = PatchHeader::new(FORMAT_MATCH_BLOCKS, opts.compression);
    let target_size = target.len() as u64;

    // The container is assembled in memory and written in one go, so a
    // failing engine or codec leaves `out` untouched.
    let mut container = Vec::new();
    header.write_to(&mut container)?;
    varsize::write_size(&mut container, target_size)?;
    let mut stats = CreateStats {
        target_size,
        ..CreateStats::default()
    };

    if !target.is_empty() {
        let started = Instant::now();
        let raw = engine.compute_delta(source, target, &opts.delta_params())?;
        info!("Match blocks algorithm completed in {:.2?}", started.elapsed());

        let started = Instant::now();
        let mut payload = compressor
            .compress(&raw)
            .map_err(|e| Error::CompressionFailed(e.to_string()))?;
        payload.extend(
            compressor
                .flush()
                .map_err(|e| Error::CompressionFailed(e.to_string()))?,
        );
        info!(
            "Compression ({}) completed in {:.2?}",
            opts.compression,
            started.elapsed()
        );

        stats.raw_patch_size = raw.len() as u64;
        stats.payload_size = payload.len() as u64;
        varsize::write_size(&mut container, stats.raw_patch_size)?;
        container.extend_from_slice(&payload);
    }

    out.write_all(&container)?;
    stats.patch_size = container.len() as u64;
    Ok(stats)
}

/// Convenience wrapper returning the container as a vector.
pub fn create_patch_bytes(source: &[u8], target: &[u8], opts: &CreateOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    create_patch(source, target, &mut out, opts)?;
    Ok(out)
}
