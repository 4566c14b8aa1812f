// Container inspection: framing and codec details without applying.

use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};

use log::warn;

use super::Prelude;
use crate::codec::{CodecOptions, CodecParameters, Compression};
use crate::error::Result;
use crate::format::header::format_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchInfo {
    /// Whole container, header included.
    pub patch_size: u64,
    pub format: u8,
    pub compression: Compression,
    pub target_size: u64,
    /// Absent for an empty target.
    pub raw_patch_size: Option<u64>,
    /// Compressed bytes after the prelude.
    pub payload_size: u64,
    /// Only for non-empty targets whose codec has parameters.
    pub compression_info: Option<CodecParameters>,
}

impl PatchInfo {
    pub fn format_name(&self) -> &'static str {
        format_name(self.format)
    }

    /// Patch size as a percentage of the target size.
    pub fn patch_ratio(&self) -> Option<f64> {
        (self.target_size > 0).then(|| 100.0 * self.patch_size as f64 / self.target_size as f64)
    }
}

impl fmt::Display for PatchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type:               {}", self.format_name())?;
        writeln!(f, "Patch size:         {} bytes", self.patch_size)?;
        writeln!(f, "Target size:        {} bytes", self.target_size)?;
        match self.patch_ratio() {
            Some(ratio) => writeln!(f, "Patch/target ratio: {ratio:.1} %")?,
            None => writeln!(f, "Patch/target ratio: inf")?,
        }
        writeln!(f, "Compression:        {}", self.compression)?;
        if let Some(raw) = self.raw_patch_size {
            writeln!(f, "Raw patch size:     {raw} bytes")?;
            writeln!(f, "Payload size:       {} bytes", self.payload_size)?;
        }
        if let Some(CodecParameters::Heatshrink(p)) = self.compression_info {
            writeln!(f, "Window size:        {} bytes", 1u32 << p.window_sz2)?;
            writeln!(f, "Lookahead size:     {} bytes", 1u32 << p.lookahead_sz2)?;
        }
        Ok(())
    }
}

/// Inspect a patch starting at the current position of `patch`.
pub fn patch_info<R: Read + Seek>(patch: &mut R, opts: &CodecOptions) -> Result<PatchInfo> {
    let start = patch.stream_position()?;
    let end = patch.seek(SeekFrom::End(0))?;
    patch.seek(SeekFrom::Start(start))?;

    let prelude = Prelude::read_from(patch)?;
    let payload_start = patch.stream_position()?;
    let payload_size = end.saturating_sub(payload_start);

    let compression_info = if prelude.target_size > 0 {
        let decompressor = prelude.compression.decompressor(payload_size, opts)?;
        decompressor.parameters()
    } else {
        None
    };
    if compression_info.is_some() && prelude.compression == Compression::Heatshrink {
        warn!("heatshrink parameters are not stored in the patch; showing the configured ones");
    }

    Ok(PatchInfo {
        patch_size: end.saturating_sub(start),
        format: prelude.header.format,
        compression: prelude.compression,
        target_size: prelude.target_size,
        raw_patch_size: prelude.raw_patch_size,
        payload_size,
        compression_info,
    })
}

pub fn patch_info_bytes(patch: &[u8], opts: &CodecOptions) -> Result<PatchInfo> {
    patch_info(&mut Cursor::new(patch), opts)
}
