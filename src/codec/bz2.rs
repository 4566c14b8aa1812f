// bzip2 streams. Self-terminating.

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::{Decompress as BzDecompress, Status};

use super::stream::{RawDecoder, Step, StreamDecompressor};
use super::{CodecError, Compress, Decompress};
use crate::error::{Error, Result};

const CODEC: &str = "bz2";

pub struct Bz2Compressor {
    encoder: Option<BzEncoder<Vec<u8>>>,
}

impl Bz2Compressor {
    pub fn new(level: u32) -> Result<Self> {
        if !(1..=9).contains(&level) {
            return Err(Error::InvalidParameter(format!(
                "bz2 level must be 1..=9, got {level}"
            )));
        }
        Ok(Self {
            encoder: Some(BzEncoder::new(Vec::new(), bzip2::Compression::new(level))),
        })
    }
}

impl Compress for Bz2Compressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| CodecError::backend(CODEC, "compressor already flushed"))?;
        encoder
            .write_all(data)
            .map_err(|e| CodecError::backend(CODEC, e))?;
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| CodecError::backend(CODEC, "compressor already flushed"))?;
        encoder.finish().map_err(|e| CodecError::backend(CODEC, e))
    }
}

struct Bz2Stream(BzDecompress);

impl RawDecoder for Bz2Stream {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, CodecError> {
        let (in_before, out_before) = (self.0.total_in(), self.0.total_out());
        let status = self
            .0
            .decompress(input, output)
            .map_err(|e| CodecError::backend(CODEC, e))?;
        Ok(Step {
            consumed: (self.0.total_in() - in_before) as usize,
            produced: (self.0.total_out() - out_before) as usize,
            finished: matches!(status, Status::StreamEnd),
        })
    }
}

pub fn decompressor() -> impl Decompress {
    StreamDecompressor::new(Bz2Stream(BzDecompress::new(false)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_magic() {
        let mut c = Bz2Compressor::new(9).unwrap();
        c.compress(b"abcabcabc").unwrap();
        let out = c.flush().unwrap();
        assert_eq!(&out[..4], b"BZh9");
    }

    #[test]
    fn rejects_bad_level() {
        assert!(Bz2Compressor::new(0).is_err());
        assert!(Bz2Compressor::new(10).is_err());
    }

    #[test]
    fn garbage_is_a_backend_error() {
        let mut d = decompressor();
        d.feed(b"not a bzip2 stream at all");
        assert!(d.decompress(16).is_err());
    }
}
