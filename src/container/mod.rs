// Patch container: assembly, application and inspection.
//
// Layout:
//
//   header:1  targetSize:VarSize  [rawPatchSize:VarSize  payload...]
//
// Everything after `targetSize` is absent when the target is empty; on the
// read side an empty target short-circuits before the rest is touched. The
// payload is the compressed raw patch and runs to the end of the container.

mod apply;
mod create;
mod info;

use std::io::Read;

use crate::codec::Compression;
use crate::error::Result;
use crate::format::PatchHeader;
use crate::format::varsize;

pub use apply::{ApplyOptions, apply_patch, apply_patch_bytes, apply_patch_with};
pub use create::{CreateOptions, CreateStats, create_patch, create_patch_bytes, create_patch_with};
pub use info::{PatchInfo, patch_info, patch_info_bytes};

/// Fixed part of a container, up to (not including) the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prelude {
    pub header: PatchHeader,
    pub compression: Compression,
    pub target_size: u64,
    /// `None` for an empty target, where the field is not present.
    pub raw_patch_size: Option<u64>,
}

impl Prelude {
    /// Parse the header and size fields, leaving `r` at the payload.
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let header = PatchHeader::read_from(r)?;
        header.check_format()?;
        let compression = header.compression()?;
        let target_size = varsize::read_size(r, "target")?;
        let raw_patch_size = if target_size == 0 {
            None
        } else {
            Some(varsize::read_size(r, "raw patch")?)
        };
        Ok(Self {
            header,
            compression,
            target_size,
            raw_patch_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, FormatError};

    #[test]
    fn prelude_of_empty_target_stops_early() {
        let bytes = [0x21u8, 0x00];
        let prelude = Prelude::read_from(&mut &bytes[..]).unwrap();
        assert_eq!(prelude.compression, Compression::Lzma);
        assert_eq!(prelude.target_size, 0);
        assert_eq!(prelude.raw_patch_size, None);
    }

    #[test]
    fn prelude_reads_both_sizes() {
        let mut bytes = vec![0x26u8];
        bytes.extend(varsize::encode(1000));
        bytes.extend(varsize::encode(70));
        bytes.push(0xaa);
        let mut cursor = &bytes[..];
        let prelude = Prelude::read_from(&mut cursor).unwrap();
        assert_eq!(prelude.compression, Compression::Lz4);
        assert_eq!(prelude.target_size, 1000);
        assert_eq!(prelude.raw_patch_size, Some(70));
        assert_eq!(cursor, [0xaau8]);
    }

    #[test]
    fn prelude_errors_in_order() {
        assert!(matches!(
            Prelude::read_from(&mut &b""[..]),
            Err(Error::Format(FormatError::HeaderLength(0)))
        ));
        assert!(matches!(
            Prelude::read_from(&mut &b"\x30"[..]),
            Err(Error::Format(FormatError::UnsupportedFormat(3)))
        ));
        assert!(matches!(
            Prelude::read_from(&mut &b"\x2f"[..]),
            Err(Error::UnknownCompressionId(15))
        ));
        assert!(matches!(
            Prelude::read_from(&mut &b"\x20"[..]),
            Err(Error::Format(FormatError::MissingSizeByte))
        ));
        assert!(matches!(
            Prelude::read_from(&mut &b"\x20\x05\x80"[..]),
            Err(Error::Format(FormatError::TruncatedSize))
        ));
    }
}
