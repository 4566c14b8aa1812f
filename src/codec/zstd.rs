// Zstandard frames. A single frame per payload; the frame end terminates it.

use ::zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};

use super::stream::{RawDecoder, Step, StreamDecompressor};
use super::{CodecError, Compress, Decompress};
use crate::error::{Error, Result};

const CODEC: &str = "zstd";

pub struct ZstdCompressor {
    level: i32,
    data: Vec<u8>,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Result<Self> {
        let range = ::zstd::compression_level_range();
        if !range.contains(&level) {
            return Err(Error::InvalidParameter(format!(
                "zstd level must be {}..={}, got {level}",
                range.start(),
                range.end()
            )));
        }
        Ok(Self {
            level,
            data: Vec::new(),
        })
    }
}

impl Compress for ZstdCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.data.extend_from_slice(data);
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
        let out = ::zstd::bulk::compress(&self.data, self.level)
            .map_err(|e| CodecError::backend(CODEC, e))?;
        self.data.clear();
        Ok(out)
    }
}

struct ZstdStream(Decoder<'static>);

impl RawDecoder for ZstdStream {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, CodecError> {
        let mut src = InBuffer::around(input);
        let mut dst = OutBuffer::around(output);
        let hint = self
            .0
            .run(&mut src, &mut dst)
            .map_err(|e| CodecError::backend(CODEC, e))?;
        Ok(Step {
            consumed: src.pos(),
            produced: dst.pos(),
            finished: hint == 0,
        })
    }
}

pub fn decompressor() -> Result<impl Decompress> {
    let decoder =
        Decoder::new().map_err(|e| Error::DecompressionFailed(format!("{CODEC}: {e}")))?;
    Ok(StreamDecompressor::new(ZstdStream(decoder)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_magic() {
        let mut c = ZstdCompressor::new(3).unwrap();
        c.compress(b"zstd zstd zstd").unwrap();
        let out = c.flush().unwrap();
        assert_eq!(&out[..4], [0x28, 0xb5, 0x2f, 0xfd]);
    }

    #[test]
    fn rejects_bad_level() {
        assert!(ZstdCompressor::new(1000).is_err());
    }

    #[test]
    fn garbage_is_a_backend_error() {
        let mut d = decompressor().unwrap();
        d.feed(b"definitely not zstd");
        assert!(d.decompress(16).is_err());
    }
}
