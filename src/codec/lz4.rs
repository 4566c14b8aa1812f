// LZ4 frames.
//
// The frame layer (magic, descriptor, block headers, checksums) is parsed
// here so decoding can proceed block by block as input arrives; block
// payloads go through `lz4_flex`. Both independent and linked block modes
// are accepted. Header and content checksums are skipped, not verified.

use std::io::Write;

use lz4_flex::block;
use lz4_flex::frame::FrameEncoder;

use super::{CodecError, Compress, Decompress};

const CODEC: &str = "lz4";

const MAGIC: u32 = 0x184D_2204;
const FLG_VERSION: u8 = 0x40;
const FLG_INDEPENDENT: u8 = 0x20;
const FLG_BLOCK_CHECKSUM: u8 = 0x10;
const FLG_CONTENT_SIZE: u8 = 0x08;
const FLG_CONTENT_CHECKSUM: u8 = 0x04;
const FLG_DICT_ID: u8 = 0x01;
const UNCOMPRESSED_BIT: u32 = 0x8000_0000;
const LINKED_WINDOW: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

pub struct Lz4Compressor {
    encoder: Option<FrameEncoder<Vec<u8>>>,
}

impl Lz4Compressor {
    pub fn new() -> Self {
        Self {
            encoder: Some(FrameEncoder::new(Vec::new())),
        }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compress for Lz4Compressor {
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

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Descriptor {
    independent: bool,
    block_checksum: bool,
    content_checksum: bool,
    max_block: usize,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Header,
    BlockSize,
    BlockData { size: usize, compressed: bool },
    ContentChecksum,
    Done,
}

enum Progress {
    Advanced,
    NeedInput,
    Done,
}

pub struct Lz4Decompressor {
    input: Vec<u8>,
    pos: usize,
    state: State,
    descriptor: Option<Descriptor>,
    pending: Vec<u8>,
    pending_pos: usize,
    history: Vec<u8>,
    starved: bool,
}

impl Lz4Decompressor {
    pub fn new() -> Self {
        Self {
            input: Vec::new(),
            pos: 0,
            state: State::Header,
            descriptor: None,
            pending: Vec::new(),
            pending_pos: 0,
            history: Vec::new(),
            starved: true,
        }
    }

    fn available(&self) -> &[u8] {
        &self.input[self.pos..]
    }

    fn pending_drained(&self) -> bool {
        self.pending_pos == self.pending.len()
    }

    fn descriptor(&self) -> Result<Descriptor, CodecError> {
        self.descriptor
            .ok_or_else(|| CodecError::corrupt(CODEC, "block before frame descriptor"))
    }

    fn read_header(&mut self) -> Result<Progress, CodecError> {
        let avail = self.available();
        if avail.len() < 7 {
            return Ok(Progress::NeedInput);
        }
        let magic = u32::from_le_bytes([avail[0], avail[1], avail[2], avail[3]]);
        if magic != MAGIC {
            return Err(CodecError::corrupt(
                CODEC,
                format!("bad frame magic {magic:#010x}"),
            ));
        }
        let flg = avail[4];
        if flg & 0xc0 != FLG_VERSION {
            return Err(CodecError::corrupt(CODEC, "unsupported frame version"));
        }
        if flg & FLG_DICT_ID != 0 {
            return Err(CodecError::corrupt(CODEC, "dictionary frames are not supported"));
        }
        let max_block = match (avail[5] >> 4) & 0x07 {
            4 => 64 * 1024,
            5 => 256 * 1024,
            6 => 1024 * 1024,
            7 => 4 * 1024 * 1024,
            other => {
                return Err(CodecError::corrupt(
                    CODEC,
                    format!("bad block size code {other}"),
                ));
            }
        };
        let header_len = 7 + if flg & FLG_CONTENT_SIZE != 0 { 8 } else { 0 };
        if avail.len() < header_len {
            return Ok(Progress::NeedInput);
        }

        self.descriptor = Some(Descriptor {
            independent: flg & FLG_INDEPENDENT != 0,
            block_checksum: flg & FLG_BLOCK_CHECKSUM != 0,
            content_checksum: flg & FLG_CONTENT_CHECKSUM != 0,
            max_block,
        });
        self.pos += header_len;
        self.state = State::BlockSize;
        Ok(Progress::Advanced)
    }

    fn read_block_size(&mut self) -> Result<Progress, CodecError> {
        let descriptor = self.descriptor()?;
        let avail = self.available();
        if avail.len() < 4 {
            return Ok(Progress::NeedInput);
        }
        let word = u32::from_le_bytes([avail[0], avail[1], avail[2], avail[3]]);
        self.pos += 4;

        if word == 0 {
            self.state = if descriptor.content_checksum {
                State::ContentChecksum
            } else {
                State::Done
            };
            return Ok(Progress::Advanced);
        }

        let size = (word & !UNCOMPRESSED_BIT) as usize;
        if size > descriptor.max_block {
            return Err(CodecError::corrupt(
                CODEC,
                format!("block of {size} bytes exceeds maximum {}", descriptor.max_block),
            ));
        }
        self.state = State::BlockData {
            size,
            compressed: word & UNCOMPRESSED_BIT == 0,
        };
        Ok(Progress::Advanced)
    }

    fn read_block(&mut self, size: usize, compressed: bool) -> Result<Progress, CodecError> {
        let descriptor = self.descriptor()?;
        let checksum_len = if descriptor.block_checksum { 4 } else { 0 };
        if self.available().len() < size + checksum_len {
            return Ok(Progress::NeedInput);
        }

        let start = self.pos;
        let data = &self.input[start..start + size];
        if compressed {
            self.pending.resize(descriptor.max_block, 0);
            let n = if descriptor.independent || self.history.is_empty() {
                block::decompress_into(data, &mut self.pending)
            } else {
                block::decompress_into_with_dict(data, &mut self.pending, &self.history)
            }
            .map_err(|e| CodecError::corrupt(CODEC, e.to_string()))?;
            self.pending.truncate(n);
        } else {
            self.pending.clear();
            self.pending.extend_from_slice(data);
        }
        self.pending_pos = 0;

        if !descriptor.independent {
            self.history.extend_from_slice(&self.pending);
            if self.history.len() > LINKED_WINDOW {
                let excess = self.history.len() - LINKED_WINDOW;
                self.history.drain(..excess);
            }
        }

        self.pos += size + checksum_len;
        self.state = State::BlockSize;
        Ok(Progress::Advanced)
    }

    fn advance(&mut self) -> Result<Progress, CodecError> {
        match self.state {
            State::Header => self.read_header(),
            State::BlockSize => self.read_block_size(),
            State::BlockData { size, compressed } => self.read_block(size, compressed),
            State::ContentChecksum => {
                if self.available().len() < 4 {
                    return Ok(Progress::NeedInput);
                }
                self.pos += 4;
                self.state = State::Done;
                Ok(Progress::Advanced)
            }
            State::Done => Ok(Progress::Done),
        }
    }
}

impl Default for Lz4Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompress for Lz4Decompressor {
    fn needs_input(&self) -> bool {
        !self.is_exhausted() && self.pending_drained() && self.starved
    }

    fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Done) && self.pending_drained()
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.input.drain(..self.pos);
        self.pos = 0;
        self.input.extend_from_slice(chunk);
        self.starved = false;
    }

    fn decompress(&mut self, max_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(max_len.min(64 * 1024));

        while out.len() < max_len {
            if !self.pending_drained() {
                let n = (max_len - out.len()).min(self.pending.len() - self.pending_pos);
                out.extend_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                continue;
            }
            match self.advance()? {
                Progress::Advanced => {}
                Progress::NeedInput => {
                    self.starved = true;
                    break;
                }
                Progress::Done => break,
            }
        }

        Ok(out)
    }
}
