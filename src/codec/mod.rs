// Compression codec registry.
//
// A closed set of seven codecs, each identified by a 4-bit id stored in the
// patch header and by a lowercase name used on the command line. Every codec
// provides a whole-buffer compressor and an incremental decompressor with a
// uniform pull contract, which is what the streaming patch reader drives.
//
// Codecs fall in two families:
//
// - fixed-length (`none`, `crle`, `heatshrink`): the stream carries no end
//   marker, so the decompressor is told how many compressed bytes belong to
//   the payload and reports exhaustion once they are all consumed.
// - self-terminating (`lzma`, `bz2`, `zstd`, `lz4`): the stream ends itself
//   and exhaustion is the backend reporting end of stream.

pub mod bz2;
pub mod crle;
pub mod heatshrink;
pub mod lz4;
pub mod lzma;
pub mod none;
mod stream;
pub mod zstd;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::{Error, Result};

pub use self::heatshrink::HeatshrinkParams;

// ---------------------------------------------------------------------------
// Codec identity
// ---------------------------------------------------------------------------

/// Compression codec of a patch payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    #[default]
    Lzma = 1,
    Crle = 2,
    Bz2 = 3,
    Heatshrink = 4,
    Zstd = 5,
    Lz4 = 6,
}

impl Compression {
    /// All codecs, ordered by id.
    pub const ALL: [Compression; 7] = [
        Compression::None,
        Compression::Lzma,
        Compression::Crle,
        Compression::Bz2,
        Compression::Heatshrink,
        Compression::Zstd,
        Compression::Lz4,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lzma => "lzma",
            Compression::Crle => "crle",
            Compression::Bz2 => "bz2",
            Compression::Heatshrink => "heatshrink",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.id() == id)
            .ok_or(Error::UnknownCompressionId(id))
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::UnknownCompressionName(name.to_string()))
    }

    /// Whether the decompressor needs the compressed payload length.
    pub fn is_fixed_length(self) -> bool {
        matches!(
            self,
            Compression::None | Compression::Crle | Compression::Heatshrink
        )
    }

    /// Build a compressor for this codec.
    pub fn compressor(self, opts: &CodecOptions) -> Result<Box<dyn Compress>> {
        Ok(match self {
            Compression::None => Box::new(self::none::NoneCompressor::new()),
            Compression::Lzma => Box::new(self::lzma::LzmaCompressor::new(opts.lzma_preset)?),
            Compression::Crle => Box::new(self::crle::CrleCompressor::new()),
            Compression::Bz2 => Box::new(self::bz2::Bz2Compressor::new(opts.bz2_level)?),
            Compression::Heatshrink => {
                Box::new(self::heatshrink::HeatshrinkCompressor::new(opts.heatshrink)?)
            }
            Compression::Zstd => Box::new(self::zstd::ZstdCompressor::new(opts.zstd_level)?),
            Compression::Lz4 => Box::new(self::lz4::Lz4Compressor::new()),
        })
    }

    /// Build a decompressor for a payload of `compressed_len` bytes.
    ///
    /// Only the fixed-length codecs use `compressed_len`; the others find the
    /// end of their stream on their own.
    pub fn decompressor(
        self,
        compressed_len: u64,
        opts: &CodecOptions,
    ) -> Result<Box<dyn Decompress>> {
        Ok(match self {
            Compression::None => Box::new(self::none::NoneDecompressor::new(compressed_len)),
            Compression::Lzma => Box::new(self::lzma::decompressor()?),
            Compression::Crle => Box::new(self::crle::CrleDecompressor::new(compressed_len)),
            Compression::Bz2 => Box::new(self::bz2::decompressor()),
            Compression::Heatshrink => Box::new(self::heatshrink::HeatshrinkDecompressor::new(
                compressed_len,
                opts.heatshrink,
            )?),
            Compression::Zstd => Box::new(self::zstd::decompressor()?),
            Compression::Lz4 => Box::new(self::lz4::Lz4Decompressor::new()),
        })
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl TryFrom<u8> for Compression {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        Self::from_id(id)
    }
}

fn format_or<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} or {}", head.join(", "), last.as_ref())
        }
    }
}

/// Codec names in sorted order, for error messages.
pub(crate) fn expected_compression_names() -> String {
    let mut names: Vec<&str> = Compression::ALL.iter().map(|c| c.name()).collect();
    names.sort_unstable();
    format_or(&names)
}

/// `name(id)` pairs in id order, for error messages.
pub(crate) fn expected_compression_ids() -> String {
    let items: Vec<String> = Compression::ALL
        .iter()
        .map(|c| format!("{}({})", c.name(), c.id()))
        .collect();
    format_or(&items)
}

// ---------------------------------------------------------------------------
// Options and parameters
// ---------------------------------------------------------------------------

/// Tuning knobs for the codecs that have any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Heatshrink window/lookahead. Not stored in the patch; both sides must agree.
    pub heatshrink: HeatshrinkParams,
    /// liblzma preset (0-9).
    pub lzma_preset: u32,
    /// bzip2 block size level (1-9).
    pub bz2_level: u32,
    /// zstd level.
    pub zstd_level: i32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            heatshrink: HeatshrinkParams::default(),
            lzma_preset: 6,
            bz2_level: 9,
            zstd_level: 3,
        }
    }
}

/// Codec-specific parameters a decompressor can report for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecParameters {
    Heatshrink(HeatshrinkParams),
}

impl CodecParameters {
    /// Parameter names and values, in display order.
    pub fn entries(&self) -> Vec<(&'static str, u32)> {
        match self {
            CodecParameters::Heatshrink(p) => vec![
                ("window-sz2", u32::from(p.window_sz2)),
                ("lookahead-sz2", u32::from(p.lookahead_sz2)),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Failure inside a codec adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The compressed stream is structurally invalid.
    #[error("corrupt {codec} stream: {detail}")]
    Corrupt { codec: &'static str, detail: String },
    /// The backend library reported an error.
    #[error("{codec}: {detail}")]
    Backend { codec: &'static str, detail: String },
}

impl CodecError {
    pub(crate) fn corrupt(codec: &'static str, detail: impl Into<String>) -> Self {
        CodecError::Corrupt {
            codec,
            detail: detail.into(),
        }
    }

    pub(crate) fn backend(codec: &'static str, err: impl fmt::Display) -> Self {
        CodecError::Backend {
            codec,
            detail: err.to_string(),
        }
    }
}

/// Whole-buffer compressor. `compress` may buffer and return nothing until
/// `flush` produces the remainder of the stream.
pub trait Compress {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn flush(&mut self) -> Result<Vec<u8>, CodecError>;
}

/// Incremental decompressor driven by the patch reader.
///
/// The reader alternates between `feed` (when `needs_input`) and
/// `decompress` until it has the bytes it wants, and treats `is_exhausted`
/// as the end of the payload.
pub trait Decompress {
    /// No further output can be produced without more input.
    fn needs_input(&self) -> bool;

    /// The stream has ended; no more output will ever be produced.
    fn is_exhausted(&self) -> bool;

    /// Hand the next chunk of compressed bytes to the decompressor.
    fn feed(&mut self, chunk: &[u8]);

    /// Produce at most `max_len` bytes. May return fewer, including none.
    fn decompress(&mut self, max_len: usize) -> Result<Vec<u8>, CodecError>;

    /// Parameters worth reporting when inspecting a patch.
    fn parameters(&self) -> Option<CodecParameters> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_names_are_stable() {
        let expected = [
            (0, "none"),
            (1, "lzma"),
            (2, "crle"),
            (3, "bz2"),
            (4, "heatshrink"),
            (5, "zstd"),
            (6, "lz4"),
        ];
        for (codec, (id, name)) in Compression::ALL.iter().zip(expected) {
            assert_eq!(codec.id(), id);
            assert_eq!(codec.name(), name);
            assert_eq!(Compression::from_id(id).unwrap(), *codec);
            assert_eq!(name.parse::<Compression>().unwrap(), *codec);
        }
    }

    #[test]
    fn unknown_lookups_fail() {
        assert!(matches!(
            Compression::from_name("gzip"),
            Err(Error::UnknownCompressionName(ref n)) if n == "gzip"
        ));
        for id in 7..=15 {
            assert!(matches!(
                Compression::from_id(id),
                Err(Error::UnknownCompressionId(i)) if i == id
            ));
        }
        // Names are case sensitive.
        assert!(Compression::from_name("LZMA").is_err());
    }

    #[test]
    fn fixed_length_family() {
        let fixed: Vec<_> = Compression::ALL
            .into_iter()
            .filter(|c| c.is_fixed_length())
            .collect();
        assert_eq!(
            fixed,
            [Compression::None, Compression::Crle, Compression::Heatshrink]
        );
    }

    #[test]
    fn format_or_joins() {
        assert_eq!(format_or::<&str>(&[]), "");
        assert_eq!(format_or(&["a"]), "a");
        assert_eq!(format_or(&["a", "b"]), "a or b");
        assert_eq!(format_or(&["a", "b", "c"]), "a, b or c");
    }

    #[test]
    fn only_heatshrink_reports_parameters() {
        let opts = CodecOptions::default();
        for codec in Compression::ALL {
            let d = codec.decompressor(0, &opts).unwrap();
            match codec {
                Compression::Heatshrink => assert_eq!(
                    d.parameters(),
                    Some(CodecParameters::Heatshrink(HeatshrinkParams::default()))
                ),
                _ => assert_eq!(d.parameters(), None),
            }
        }
    }

    #[test]
    fn parameter_entries() {
        let p = CodecParameters::Heatshrink(HeatshrinkParams::default());
        assert_eq!(p.entries(), [("window-sz2", 8), ("lookahead-sz2", 7)]);
    }
}
