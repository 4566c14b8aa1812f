// One-byte patch header.
//
// Bit layout, most significant first:
//
//   [reserved:1][format:3][compression:4]
//
// The reserved bit is written as zero and ignored on read.

use std::io::{Read, Write};

use super::varsize;
use crate::codec::Compression;
use crate::error::{FormatError, Result};

/// Format discriminator for sequential match-block patches.
pub const FORMAT_MATCH_BLOCKS: u8 = 2;

const FORMAT_MAX: u8 = 0x07;
const COMPRESSION_MAX: u8 = 0x0f;

/// Pack the two header fields into a single byte.
pub fn pack(format: u8, compression: u8) -> Result<u8, FormatError> {
    if format > FORMAT_MAX {
        return Err(FormatError::FieldOutOfRange {
            field: "format",
            value: format,
        });
    }
    if compression > COMPRESSION_MAX {
        return Err(FormatError::FieldOutOfRange {
            field: "compression",
            value: compression,
        });
    }
    Ok((format << 4) | compression)
}

/// Unpack a header slice into `(format, compression)`.
pub fn unpack(data: &[u8]) -> Result<(u8, u8), FormatError> {
    match data {
        [byte] => Ok(split(*byte)),
        _ => Err(FormatError::HeaderLength(data.len())),
    }
}

fn split(byte: u8) -> (u8, u8) {
    ((byte >> 4) & FORMAT_MAX, byte & COMPRESSION_MAX)
}

/// Parsed header with the compression id kept raw, so unknown ids can be
/// reported with the numeric value the patch actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    pub format: u8,
    pub compression_id: u8,
}

impl PatchHeader {
    pub fn new(format: u8, compression: Compression) -> Self {
        Self {
            format,
            compression_id: compression.id(),
        }
    }

    pub fn to_byte(self) -> Result<u8, FormatError> {
        pack(self.format, self.compression_id)
    }

    pub fn from_byte(byte: u8) -> Self {
        let (format, compression_id) = split(byte);
        Self {
            format,
            compression_id,
        }
    }

    pub fn write_to<W: Write + ?Sized>(self, w: &mut W) -> Result<()> {
        w.write_all(&[self.to_byte()?])?;
        Ok(())
    }

    /// Read exactly one header byte. An empty stream is `HeaderLength(0)`.
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let byte = varsize::read_byte(r)?;
        let (format, compression_id) = unpack(byte.as_slice())?;
        Ok(Self {
            format,
            compression_id,
        })
    }

    /// Resolve the compression id against the codec registry.
    pub fn compression(self) -> Result<Compression> {
        Compression::from_id(self.compression_id)
    }

    /// Reject formats the apply path does not understand.
    pub fn check_format(self) -> Result<(), FormatError> {
        if self.format == FORMAT_MATCH_BLOCKS {
            Ok(())
        } else {
            Err(FormatError::UnsupportedFormat(self.format))
        }
    }
}

/// Human-readable name of a format discriminator.
pub fn format_name(format: u8) -> &'static str {
    match format {
        FORMAT_MATCH_BLOCKS => "match-blocks",
        _ => "unknown",
    }
}
