// Container application.
//
// ReadHeader -> (ShortCircuitEmpty | ReadRawSize -> Decompress -> ApplyDelta)
//
// The payload length is whatever follows the prelude, so the patch stream
// must be seekable. Output is written only after the engine succeeded and
// its result has the declared target size.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use log::debug;

use super::Prelude;
use crate::codec::CodecOptions;
use crate::engine::{DeltaEngine, EngineError, MatchBlocks};
use crate::error::{FormatError, Result};
use crate::reader::PatchReader;

/// Options for `apply_patch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Must match what the patch was created with (heatshrink parameters
    /// in particular are not stored in the patch).
    pub codec: CodecOptions,
}

/// Apply `patch` to `source` with the bundled engine, writing the target to `out`.
/// Returns the number of bytes written.
pub fn apply_patch<R: Read + Seek, W: Write + ?Sized>(
    source: &[u8],
    patch: &mut R,
    out: &mut W,
    opts: &ApplyOptions,
) -> Result<u64> {
    apply_patch_with(&MatchBlocks, source, patch, out, opts)
}

/// Apply `patch` with a caller-supplied delta engine.
pub fn apply_patch_with<E: DeltaEngine + ?Sized, R: Read + Seek, W: Write + ?Sized>(
    engine: &E,
    source: &[u8],
    patch: &mut R,
    out: &mut W,
    opts: &ApplyOptions,
) -> Result<u64> {
    let prelude = Prelude::read_from(patch)?;
    debug!(
        "apply: {} compression, target {} bytes",
        prelude.compression, prelude.target_size
    );

    let Some(raw_patch_size) = prelude.raw_patch_size else {
        debug!("apply: empty target");
        return Ok(0);
    };

    let payload_start = patch.stream_position()?;
    let payload_end = patch.seek(SeekFrom::End(0))?;
    patch.seek(SeekFrom::Start(payload_start))?;
    let payload_len = payload_end.saturating_sub(payload_start);
    let raw_len = usize::try_from(raw_patch_size).map_err(|_| FormatError::SizeOverflow)?;
    debug!("apply: raw patch {raw_len} bytes, payload {payload_len} bytes");

    let mut reader = PatchReader::new(
        patch.take(payload_len),
        prelude.compression,
        payload_len,
        &opts.codec,
    )?;
    let raw = reader.decompress(raw_len)?;
    debug!("apply: payload decompressed");

    let target = engine.apply_delta(source, &raw)?;
    if target.len() as u64 != prelude.target_size {
        return Err(EngineError::SizeMismatch {
            expected: prelude.target_size,
            actual: target.len() as u64,
        }
        .into());
    }
    out.write_all(&target)?;
    debug!("apply: done");
    Ok(prelude.target_size)
}

/// Convenience wrapper over in-memory patches.
pub fn apply_patch_bytes(source: &[u8], patch: &[u8], opts: &ApplyOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    apply_patch(source, &mut Cursor::new(patch), &mut out, opts)?;
    Ok(out)
}
