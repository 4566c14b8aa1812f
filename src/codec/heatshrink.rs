// Heatshrink-style LZSS for small targets.
//
// Bitstream, most significant bit first:
//
//   1 <8-bit literal>
//   0 <window_sz2 bits: offset - 1> <lookahead_sz2 bits: length - 1>
//
// Back-references point into the last `2^window_sz2` output bytes and copy
// at most `2^lookahead_sz2` bytes (overlap allowed). The final byte is
// zero-padded, so the decoder relies on the payload length to tell padding
// from data. Window and lookahead sizes are not stored in the stream.

use std::fmt;

use super::{CodecError, CodecParameters, Compress, Decompress};
use crate::error::{Error, Result};

pub const MIN_WINDOW_SZ2: u8 = 4;
pub const MAX_WINDOW_SZ2: u8 = 15;
pub const MIN_LOOKAHEAD_SZ2: u8 = 3;

/// Match candidates examined per position.
const MAX_CHAIN: usize = 128;

const NO_POS: usize = usize::MAX;

/// Window and lookahead sizes, as powers of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatshrinkParams {
    pub window_sz2: u8,
    pub lookahead_sz2: u8,
}

impl Default for HeatshrinkParams {
    fn default() -> Self {
        Self {
            window_sz2: 8,
            lookahead_sz2: 7,
        }
    }
}

impl HeatshrinkParams {
    pub fn new(window_sz2: u8, lookahead_sz2: u8) -> Result<Self> {
        let params = Self {
            window_sz2,
            lookahead_sz2,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_WINDOW_SZ2..=MAX_WINDOW_SZ2).contains(&self.window_sz2) {
            return Err(Error::InvalidParameter(format!(
                "heatshrink window-sz2 must be {MIN_WINDOW_SZ2}..={MAX_WINDOW_SZ2}, got {}",
                self.window_sz2
            )));
        }
        if self.lookahead_sz2 < MIN_LOOKAHEAD_SZ2 || self.lookahead_sz2 >= self.window_sz2 {
            return Err(Error::InvalidParameter(format!(
                "heatshrink lookahead-sz2 must be {MIN_LOOKAHEAD_SZ2}..{}, got {}",
                self.window_sz2, self.lookahead_sz2
            )));
        }
        Ok(())
    }

    fn window_len(&self) -> usize {
        1 << self.window_sz2
    }

    fn max_match(&self) -> usize {
        1 << self.lookahead_sz2
    }

    fn backref_bits(&self) -> usize {
        1 + usize::from(self.window_sz2) + usize::from(self.lookahead_sz2)
    }
}

impl fmt::Display for HeatshrinkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "window-sz2={} lookahead-sz2={}",
            self.window_sz2, self.lookahead_sz2
        )
    }
}

// ---------------------------------------------------------------------------
// Bit I/O
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    current: u8,
    used: u8,
}

impl BitWriter {
    fn push(&mut self, value: u32, bits: u8) {
        for i in (0..bits).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.current = (self.current << 1) | bit;
            self.used += 1;
            if self.used == 8 {
                self.out.push(self.current);
                self.current = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.out.push(self.current << (8 - self.used));
        }
        self.out
    }
}

/// Read `bits` bits starting at bit index `at`. Caller guarantees they exist.
fn read_bits(data: &[u8], at: usize, bits: usize) -> u32 {
    let mut value = 0u32;
    for i in at..at + bits {
        let bit = (data[i / 8] >> (7 - i % 8)) & 1;
        value = (value << 1) | u32::from(bit);
    }
    value
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

pub struct HeatshrinkCompressor {
    params: HeatshrinkParams,
    data: Vec<u8>,
}

impl HeatshrinkCompressor {
    pub fn new(params: HeatshrinkParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            data: Vec::new(),
        })
    }
}

/// Hash chains over two-byte prefixes.
struct MatchFinder {
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl MatchFinder {
    fn new(len: usize) -> Self {
        Self {
            head: vec![NO_POS; 1 << 16],
            prev: vec![NO_POS; len],
        }
    }

    fn key(data: &[u8], pos: usize) -> Option<usize> {
        let pair = data.get(pos..pos + 2)?;
        Some(usize::from(pair[0]) << 8 | usize::from(pair[1]))
    }

    fn insert(&mut self, data: &[u8], pos: usize) {
        if let Some(key) = Self::key(data, pos) {
            self.prev[pos] = self.head[key];
            self.head[key] = pos;
        }
    }

    /// Longest earlier match for `pos` within the window: `(length, offset)`.
    fn longest(&self, data: &[u8], pos: usize, params: &HeatshrinkParams) -> (usize, usize) {
        let Some(key) = Self::key(data, pos) else {
            return (0, 0);
        };
        let limit = params.max_match().min(data.len() - pos);
        let mut best = (0, 0);
        let mut candidate = self.head[key];
        let mut steps = 0;

        while candidate != NO_POS && steps < MAX_CHAIN {
            let offset = pos - candidate;
            if offset > params.window_len() {
                break;
            }
            let len = data[candidate..]
                .iter()
                .zip(&data[pos..pos + limit])
                .take_while(|(a, b)| a == b)
                .count();
            if len > best.0 {
                best = (len, offset);
                if len == limit {
                    break;
                }
            }
            candidate = self.prev[candidate];
            steps += 1;
        }
        best
    }
}

/// Encode `data` as a complete stream.
pub fn encode(data: &[u8], params: &HeatshrinkParams) -> Vec<u8> {
    let mut bits = BitWriter::default();
    let mut finder = MatchFinder::new(data.len());
    let breakeven = params.backref_bits() / 8;
    let mut pos = 0;

    while pos < data.len() {
        let (len, offset) = finder.longest(data, pos, params);
        if len > breakeven {
            bits.push(0, 1);
            bits.push((offset - 1) as u32, params.window_sz2);
            bits.push((len - 1) as u32, params.lookahead_sz2);
            for p in pos..pos + len {
                finder.insert(data, p);
            }
            pos += len;
        } else {
            bits.push(1, 1);
            bits.push(u32::from(data[pos]), 8);
            finder.insert(data, pos);
            pos += 1;
        }
    }

    bits.finish()
}

impl Compress for HeatshrinkCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.data.extend_from_slice(data);
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
        let out = encode(&self.data, &self.params);
        self.data.clear();
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Tag,
    Copy { offset: usize, remaining: usize },
}

pub struct HeatshrinkDecompressor {
    params: HeatshrinkParams,
    length: u64,
    fed: u64,
    input: Vec<u8>,
    bit_pos: usize,
    window: Vec<u8>,
    head: usize,
    state: State,
}

impl HeatshrinkDecompressor {
    pub fn new(length: u64, params: HeatshrinkParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            length,
            fed: 0,
            input: Vec::new(),
            bit_pos: 0,
            window: vec![0; params.window_len()],
            head: 0,
            state: State::Tag,
        })
    }

    fn bits_available(&self) -> usize {
        self.input.len() * 8 - self.bit_pos
    }

    /// Bits the next literal or back-reference occupies, if its tag is readable.
    fn next_item_bits(&self) -> Option<usize> {
        if self.bits_available() == 0 {
            return None;
        }
        if read_bits(&self.input, self.bit_pos, 1) == 1 {
            Some(9)
        } else {
            Some(self.params.backref_bits())
        }
    }

    fn has_complete_item(&self) -> bool {
        match self.state {
            State::Copy { .. } => true,
            State::Tag => self
                .next_item_bits()
                .is_some_and(|bits| bits <= self.bits_available()),
        }
    }

    fn push_output(&mut self, byte: u8, out: &mut Vec<u8>) {
        let mask = self.window.len() - 1;
        self.window[self.head & mask] = byte;
        self.head = self.head.wrapping_add(1);
        out.push(byte);
    }
}

impl Decompress for HeatshrinkDecompressor {
    fn needs_input(&self) -> bool {
        !self.is_exhausted() && !self.has_complete_item()
    }

    fn is_exhausted(&self) -> bool {
        // Fewer than eight bits left after the last byte is padding.
        self.state == State::Tag && self.fed >= self.length && self.bits_available() < 8
    }

    fn feed(&mut self, chunk: &[u8]) {
        let consumed = self.bit_pos / 8;
        self.input.drain(..consumed);
        self.bit_pos -= consumed * 8;
        let room = self.length.saturating_sub(self.fed);
        let take = chunk.len().min(usize::try_from(room).unwrap_or(usize::MAX));
        self.input.extend_from_slice(&chunk[..take]);
        self.fed += take as u64;
    }

    fn decompress(&mut self, max_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(max_len.min(64 * 1024));
        let mask = self.window.len() - 1;

        while out.len() < max_len {
            match self.state {
                State::Copy { offset, remaining } => {
                    let byte = self.window[self.head.wrapping_sub(offset) & mask];
                    self.push_output(byte, &mut out);
                    self.state = match remaining - 1 {
                        0 => State::Tag,
                        remaining => State::Copy { offset, remaining },
                    };
                }
                State::Tag => {
                    if self.is_exhausted() || !self.has_complete_item() {
                        break;
                    }
                    let at = self.bit_pos;
                    if read_bits(&self.input, at, 1) == 1 {
                        let byte = read_bits(&self.input, at + 1, 8) as u8;
                        self.bit_pos += 9;
                        self.push_output(byte, &mut out);
                    } else {
                        let w = usize::from(self.params.window_sz2);
                        let l = usize::from(self.params.lookahead_sz2);
                        let offset = read_bits(&self.input, at + 1, w) as usize + 1;
                        let count = read_bits(&self.input, at + 1 + w, l) as usize + 1;
                        self.bit_pos += 1 + w + l;
                        self.state = State::Copy {
                            offset,
                            remaining: count,
                        };
                    }
                }
            }
        }

        Ok(out)
    }

    fn parameters(&self) -> Option<CodecParameters> {
        Some(CodecParameters::Heatshrink(self.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(encoded: &[u8], params: HeatshrinkParams, chunk: usize) -> Vec<u8> {
        let mut d = HeatshrinkDecompressor::new(encoded.len() as u64, params).unwrap();
        let mut chunks = encoded.chunks(chunk.max(1));
        let mut out = Vec::new();
        while !d.is_exhausted() {
            if d.needs_input() {
                d.feed(chunks.next().expect("decoder wants more input than exists"));
            }
            out.extend(d.decompress(100).unwrap());
        }
        out
    }

    #[test]
    fn params_validation() {
        assert!(HeatshrinkParams::new(8, 7).is_ok());
        assert!(HeatshrinkParams::new(4, 3).is_ok());
        assert!(HeatshrinkParams::new(15, 14).is_ok());
        assert!(HeatshrinkParams::new(3, 2).is_err());
        assert!(HeatshrinkParams::new(16, 4).is_err());
        assert!(HeatshrinkParams::new(8, 8).is_err());
        assert!(HeatshrinkParams::new(8, 2).is_err());
    }

    #[test]
    fn literal_bit_layout() {
        // "A" = 1 01000001 -> 1010_0000 1000_0000
        let encoded = encode(b"A", &HeatshrinkParams::default());
        assert_eq!(encoded, [0xa0, 0x80]);
    }

    #[test]
    fn repeated_bytes_use_backrefs() {
        let data = vec![b'x'; 200];
        let params = HeatshrinkParams::default();
        let encoded = encode(&data, &params);
        assert!(encoded.len() < 10, "encoded to {} bytes", encoded.len());
        assert_eq!(decode_all(&encoded, params, 3), data);
    }

    #[test]
    fn roundtrip_various_params() {
        let mut data = Vec::new();
        for i in 0..3000u32 {
            data.extend_from_slice(format!("line {} of {}\n", i % 37, i % 5).as_bytes());
        }
        for (w, l) in [(8, 7), (4, 3), (10, 4), (12, 6), (15, 14)] {
            let params = HeatshrinkParams::new(w, l).unwrap();
            let encoded = encode(&data, &params);
            assert!(encoded.len() < data.len(), "w={w} l={l}");
            assert_eq!(decode_all(&encoded, params, 4096), data, "w={w} l={l}");
            assert_eq!(decode_all(&encoded, params, 1), data, "w={w} l={l}");
        }
    }

    #[test]
    fn empty_stream() {
        let params = HeatshrinkParams::default();
        assert!(encode(b"", &params).is_empty());
        let d = HeatshrinkDecompressor::new(0, params).unwrap();
        assert!(d.is_exhausted());
    }

    #[test]
    fn missing_tail_wants_input() {
        let params = HeatshrinkParams::default();
        let encoded = encode(b"abcdefgh", &params);
        let mut d = HeatshrinkDecompressor::new(encoded.len() as u64, params).unwrap();
        d.feed(&encoded[..4]);
        let first = d.decompress(100).unwrap();
        assert_eq!(first, b"abc");
        assert!(d.needs_input());
        assert!(!d.is_exhausted());
    }

    #[test]
    fn reports_parameters() {
        let params = HeatshrinkParams::new(10, 5).unwrap();
        let d = HeatshrinkDecompressor::new(0, params).unwrap();
        assert_eq!(d.parameters(), Some(CodecParameters::Heatshrink(params)));
    }
}
