// Error taxonomy for patch containers.
//
// Every failure a caller can observe is one of the `Error` variants below.
// Codec backends and the delta engine report through their own types, which
// are folded into `Error` at the module boundary so that no backend error
// type leaks out of the crate.

use std::io;

use thiserror::Error;

use crate::codec::{expected_compression_ids, expected_compression_names};
use crate::engine::EngineError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Malformed container framing (header or size fields).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The header slice was not exactly one byte long.
    #[error("Failed to read the patch header (expected 1 byte, got {0}).")]
    HeaderLength(usize),
    /// The header names a patch format this crate cannot apply.
    #[error("Unsupported patch format {0}.")]
    UnsupportedFormat(u8),
    /// A header field does not fit its bit width.
    #[error("Header field {field} out of range: {value}.")]
    FieldOutOfRange { field: &'static str, value: u8 },
    /// The stream ended before the first byte of a size field.
    #[error("Failed to read first size byte.")]
    MissingSizeByte,
    /// The stream ended inside a multi-byte size field.
    #[error("Failed to read consecutive size byte.")]
    TruncatedSize,
    /// A size field encodes a magnitude that does not fit 64 bits.
    #[error("Size field does not fit in 64 bits.")]
    SizeOverflow,
    /// A size field that must be non-negative decoded to a negative value.
    #[error("Negative {field} size {value}.")]
    NegativeSize { field: &'static str, value: i64 },
}

/// Top-level crate error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Expected compression {}, but got {}.", expected_compression_names(), .0)]
    UnknownCompressionName(String),

    #[error("Expected compression {}, but got {}.", expected_compression_ids(), .0)]
    UnknownCompressionId(u8),

    /// The decompressor finished before producing the requested bytes.
    #[error("Early end of patch data.")]
    PrematureEndOfPatch,

    /// The decompressor wants more input but the patch region is used up.
    #[error("Out of patch data.")]
    OutOfPatchData,

    #[error("Patch decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Patch compression failed: {0}")]
    CompressionFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Delta engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_name_message_lists_sorted_names() {
        let err = Error::UnknownCompressionName("gzip".into());
        assert_eq!(
            err.to_string(),
            "Expected compression bz2, crle, heatshrink, lz4, lzma, none or zstd, but got gzip."
        );
    }

    #[test]
    fn compression_id_message_lists_ids_in_order() {
        let err = Error::UnknownCompressionId(9);
        assert_eq!(
            err.to_string(),
            "Expected compression none(0), lzma(1), crle(2), bz2(3), heatshrink(4), zstd(5) \
             or lz4(6), but got 9."
        );
    }

    #[test]
    fn format_errors_convert() {
        let err: Error = FormatError::MissingSizeByte.into();
        assert!(matches!(err, Error::Format(FormatError::MissingSizeByte)));
        assert_eq!(err.to_string(), "Failed to read first size byte.");
    }
}
