// File-level helpers for creating, applying and inspecting patches.
//
// Inputs are materialized through `SourceBuffer` (read or memory-mapped),
// the patch is streamed through a `BufReader`/`BufWriter`, and the output
// file is only created once the whole target has been rebuilt. SHA-256
// checksums are computed when the `file-io` feature is enabled.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::buffer::{ReadStrategy, SourceBuffer};
use crate::codec::CodecOptions;
use crate::container::{self, ApplyOptions, CreateOptions, PatchInfo};
use crate::error::Result;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `create_patch_file()`.
#[derive(Debug, Clone)]
pub struct CreateFileStats {
    pub source_size: u64,
    pub target_size: u64,
    /// Uncompressed delta engine output.
    pub raw_patch_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// SHA-256 of the target file (if `file-io` feature is enabled).
    pub target_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `apply_patch_file()`.
#[derive(Debug, Clone)]
pub struct ApplyFileStats {
    pub source_size: u64,
    pub patch_size: u64,
    pub output_size: u64,
    /// SHA-256 of the rebuilt output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

/// Lowercase hex rendering of a digest.
pub fn hex_digest(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// create_patch_file
// ---------------------------------------------------------------------------

/// Create a patch from `from_path` to `to_path`, writing it to `patch_path`.
///
/// `patch_path` is not touched unless the whole patch was built.
pub fn create_patch_file(
    from_path: &Path,
    to_path: &Path,
    patch_path: &Path,
    opts: &CreateOptions,
    strategy: ReadStrategy,
) -> Result<CreateFileStats> {
    let source = SourceBuffer::open(from_path, strategy)?;
    let target = SourceBuffer::open(to_path, strategy)?;

    let mut patch = Vec::new();
    let stats = container::create_patch(&source, &target, &mut patch, opts)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(patch_path)?);
    writer.write_all(&patch)?;
    writer.flush()?;

    Ok(CreateFileStats {
        source_size: source.len() as u64,
        target_size: stats.target_size,
        raw_patch_size: stats.raw_patch_size,
        patch_size: stats.patch_size,
        target_sha256: sha256(&target),
    })
}

// ---------------------------------------------------------------------------
// apply_patch_file
// ---------------------------------------------------------------------------

/// Apply `patch_path` to `from_path`, writing the result to `to_path`.
///
/// `to_path` is not touched unless the patch applies cleanly.
pub fn apply_patch_file(
    from_path: &Path,
    patch_path: &Path,
    to_path: &Path,
    opts: &ApplyOptions,
) -> Result<ApplyFileStats> {
    let source = SourceBuffer::open(from_path, ReadStrategy::Buffered)?;
    let patch_file = File::open(patch_path)?;
    let patch_size = patch_file.metadata()?.len();
    let mut patch = BufReader::with_capacity(BUF_SIZE, patch_file);

    let mut output = Vec::new();
    container::apply_patch(&source, &mut patch, &mut output, opts)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(to_path)?);
    writer.write_all(&output)?;
    writer.flush()?;

    Ok(ApplyFileStats {
        source_size: source.len() as u64,
        patch_size,
        output_size: output.len() as u64,
        output_sha256: sha256(&output),
    })
}

// ---------------------------------------------------------------------------
// patch_info_file
// ---------------------------------------------------------------------------

pub fn patch_info_file(patch_path: &Path, opts: &CodecOptions) -> Result<PatchInfo> {
    let mut patch = BufReader::with_capacity(BUF_SIZE, File::open(patch_path)?);
    container::patch_info(&mut patch, opts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
