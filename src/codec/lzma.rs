// LZMA "alone" streams through liblzma.
//
// The legacy .lzma container: a 13-byte header followed by raw LZMA data,
// terminated by an end marker. Self-terminating.

use std::io::Write;

use xz2::stream::{Action, LzmaOptions, Status, Stream};
use xz2::write::XzEncoder;

use super::stream::{RawDecoder, Step, StreamDecompressor};
use super::{CodecError, Compress, Decompress};
use crate::error::{Error, Result};

const CODEC: &str = "lzma";

pub struct LzmaCompressor {
    encoder: Option<XzEncoder<Vec<u8>>>,
}

impl LzmaCompressor {
    pub fn new(preset: u32) -> Result<Self> {
        if preset > 9 {
            return Err(Error::InvalidParameter(format!(
                "lzma preset must be 0..=9, got {preset}"
            )));
        }
        let options = LzmaOptions::new_preset(preset)
            .map_err(|e| Error::CompressionFailed(format!("{CODEC}: {e}")))?;
        let stream = Stream::new_lzma_encoder(&options)
            .map_err(|e| Error::CompressionFailed(format!("{CODEC}: {e}")))?;
        Ok(Self {
            encoder: Some(XzEncoder::new_stream(Vec::new(), stream)),
        })
    }
}

impl Compress for LzmaCompressor {
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

struct LzmaStream(Stream);

impl RawDecoder for LzmaStream {
    fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step, CodecError> {
        let (in_before, out_before) = (self.0.total_in(), self.0.total_out());
        let status = self
            .0
            .process(input, output, Action::Run)
            .map_err(|e| CodecError::backend(CODEC, e))?;
        Ok(Step {
            consumed: (self.0.total_in() - in_before) as usize,
            produced: (self.0.total_out() - out_before) as usize,
            finished: matches!(status, Status::StreamEnd),
        })
    }
}

pub fn decompressor() -> Result<impl Decompress> {
    let stream = Stream::new_lzma_decoder(u64::MAX)
        .map_err(|e| Error::DecompressionFailed(format!("{CODEC}: {e}")))?;
    Ok(StreamDecompressor::new(LzmaStream(stream)))
}
