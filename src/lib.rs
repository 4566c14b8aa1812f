//! phdiff: compact binary patches with pluggable compression.
//!
//! A patch is a small container around a delta between two byte buffers:
//!
//! ```text
//! header:1  targetSize:VarSize  rawPatchSize:VarSize  payload...
//! ```
//!
//! The header byte carries the patch format and the compression codec, the
//! sizes are VarSize integers, and the payload is the compressed raw patch
//! produced by a delta engine. The crate provides:
//! - Byte-exact container framing (`format`)
//! - Seven compression codecs behind one pull contract (`codec`)
//! - A streaming reader returning exactly N decompressed bytes (`reader`)
//! - Create / apply / inspect on whole patches (`container`)
//! - A pluggable delta engine with a bundled implementation (`engine`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use phdiff::{ApplyOptions, Compression, CreateOptions};
//!
//! let source = b"hello old world";
//! let target = b"hello new world";
//!
//! let opts = CreateOptions::with_compression(Compression::Zstd);
//! let patch = phdiff::create_patch_bytes(source, target, &opts).unwrap();
//! let rebuilt = phdiff::apply_patch_bytes(source, &patch, &ApplyOptions::default()).unwrap();
//! assert_eq!(rebuilt, target);
//! ```

pub mod buffer;
pub mod codec;
pub mod container;
pub mod engine;
pub mod error;
pub mod format;
pub mod io;
pub mod reader;

#[cfg(feature = "cli")]
pub mod cli;

pub use codec::{CodecOptions, Compression, HeatshrinkParams};
pub use container::{
    ApplyOptions, CreateOptions, CreateStats, PatchInfo, apply_patch, apply_patch_bytes,
    create_patch, create_patch_bytes, patch_info, patch_info_bytes,
};
pub use engine::{DeltaEngine, DeltaParams, MatchBlocks};
pub use error::{Error, FormatError, Result};
pub use reader::PatchReader;
