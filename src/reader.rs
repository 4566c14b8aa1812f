// Streaming patch reader.
//
// Pulls compressed bytes from the payload region in fixed-size chunks and
// drives a codec decompressor until the requested number of raw bytes has
// been produced. Short reads are errors, never silent.

use std::io::{self, Read};

use log::debug;

use crate::codec::{CodecOptions, Compression, Decompress};
use crate::error::{Error, Result};

/// Compressed bytes pulled from the source per refill.
pub const READ_CHUNK_SIZE: usize = 4096;

pub struct PatchReader<R> {
    source: R,
    decompressor: Box<dyn Decompress>,
    chunk: Vec<u8>,
    produced: u64,
}

impl<R: Read> PatchReader<R> {
    /// Reader over a payload of `compressed_len` bytes read from `source`.
    ///
    /// `source` should end where the payload ends; pass a `Take` when it
    /// does not.
    pub fn new(
        source: R,
        compression: Compression,
        compressed_len: u64,
        opts: &CodecOptions,
    ) -> Result<Self> {
        let decompressor = compression.decompressor(compressed_len, opts)?;
        Ok(Self::with_decompressor(source, decompressor))
    }

    pub fn with_decompressor(source: R, decompressor: Box<dyn Decompress>) -> Self {
        Self {
            source,
            decompressor,
            chunk: vec![0u8; READ_CHUNK_SIZE],
            produced: 0,
        }
    }

    /// Return exactly `size` decompressed bytes.
    ///
    /// Fails with `PrematureEndOfPatch` if the codec stream ends first, with
    /// `OutOfPatchData` if the source runs dry while the codec still wants
    /// input, and with `DecompressionFailed` if the codec rejects its input.
    pub fn decompress(&mut self, size: usize) -> Result<Vec<u8>> {
        self.pull(size, true)
    }

    fn pull(&mut self, size: usize, exact: bool) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(size.min(1 << 20));

        while buffer.len() < size {
            if self.decompressor.is_exhausted() {
                if exact {
                    return Err(Error::PrematureEndOfPatch);
                }
                break;
            }

            if self.decompressor.needs_input() {
                let n = self.fill()?;
                if n == 0 {
                    return Err(Error::OutOfPatchData);
                }
                self.decompressor.feed(&self.chunk[..n]);
            }

            let out = self
                .decompressor
                .decompress(size - buffer.len())
                .map_err(|e| Error::DecompressionFailed(e.to_string()))?;

            if out.is_empty()
                && !self.decompressor.needs_input()
                && !self.decompressor.is_exhausted()
            {
                return Err(Error::DecompressionFailed(
                    "decompressor stopped making progress".into(),
                ));
            }
            buffer.extend_from_slice(&out);
        }

        self.produced += buffer.len() as u64;
        debug!("patch reader: {} bytes out, {} total", buffer.len(), self.produced);
        Ok(buffer)
    }

    /// The codec stream has ended.
    pub fn is_exhausted(&self) -> bool {
        self.decompressor.is_exhausted()
    }

    /// Decompressed bytes handed out so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn decompressor(&self) -> &dyn Decompress {
        self.decompressor.as_ref()
    }

    fn fill(&mut self) -> io::Result<usize> {
        loop {
            match self.source.read(&mut self.chunk) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

impl<R: Read> Read for PatchReader<R> {
    /// Like `decompress`, but a short final read is not an error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let out = self
            .pull(buf.len(), false)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        buf[..out.len()].copy_from_slice(&out);
        Ok(out.len())
    }
}
