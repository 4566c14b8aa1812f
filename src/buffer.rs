// Read-only byte buffers for source and target files.
//
// Small inputs are simply read into memory. Large ones can be memory-mapped
// instead; both look like `&[u8]` to the rest of the crate.

use std::fs::File;
use std::io;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

/// How to materialize an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// Read the whole file into an owned buffer.
    #[default]
    Buffered,
    /// Map the file read-only.
    Mmap,
}

pub enum SourceBuffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl SourceBuffer {
    pub fn open(path: &Path, strategy: ReadStrategy) -> io::Result<Self> {
        match strategy {
            ReadStrategy::Buffered => Ok(Self::Owned(std::fs::read(path)?)),
            ReadStrategy::Mmap => {
                let file = File::open(path)?;
                if file.metadata()?.len() == 0 {
                    return Ok(Self::Owned(Vec::new()));
                }
                // SAFETY: read-only map; the file must not be truncated while
                // the buffer is alive.
                let map = unsafe { Mmap::map(&file)? };
                Ok(Self::Mapped(map))
            }
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl From<Vec<u8>> for SourceBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::Owned(data)
    }
}

impl Deref for SourceBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Owned(data) => data,
            Self::Mapped(map) => map,
        }
    }
}

impl AsRef<[u8]> for SourceBuffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn both_strategies_see_the_same_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"mapped or not").unwrap();
        file.flush().unwrap();

        let owned = SourceBuffer::open(file.path(), ReadStrategy::Buffered).unwrap();
        let mapped = SourceBuffer::open(file.path(), ReadStrategy::Mmap).unwrap();
        assert!(!owned.is_mapped());
        assert!(mapped.is_mapped());
        assert_eq!(&*owned, b"mapped or not");
        assert_eq!(&*mapped, &*owned);
    }

    #[test]
    fn empty_file_is_never_mapped() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let buf = SourceBuffer::open(file.path(), ReadStrategy::Mmap).unwrap();
        assert!(!buf.is_mapped());
        assert!(buf.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(SourceBuffer::open(&missing, ReadStrategy::Buffered).is_err());
        assert!(SourceBuffer::open(&missing, ReadStrategy::Mmap).is_err());
    }
}
