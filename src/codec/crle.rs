// Compact run-length encoding.
//
// The stream is a sequence of records:
//
//   kind:uvarint  size:uvarint  payload
//
// kind 0 (scattered): `size` literal bytes follow.
// kind 1 (repeated):  one byte follows, repeated `size` times.
//
// uvarint is little-endian base-128. Runs shorter than `MIN_REPEATED`
// stay inside scattered records. The stream has no end marker.

use super::{CodecError, Compress, Decompress};

const CODEC: &str = "crle";

const KIND_SCATTERED: u64 = 0;
const KIND_REPEATED: u64 = 1;

/// Shortest run that is emitted as a repeated record.
pub const MIN_REPEATED: usize = 6;

const MAX_UVARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// uvarint
// ---------------------------------------------------------------------------

fn write_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push(value as u8 | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// `Ok(None)` when `data` ends before the value does.
fn read_uvarint(data: &[u8]) -> Result<Option<(u64, usize)>, CodecError> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate().take(MAX_UVARINT_LEN) {
        let group = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        if shift >= u64::BITS || (group << shift) >> shift != group {
            return Err(CodecError::corrupt(CODEC, "record field overflows 64 bits"));
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if data.len() >= MAX_UVARINT_LEN {
        return Err(CodecError::corrupt(CODEC, "record field too long"));
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

/// Buffers everything and encodes on `flush`, so runs spanning
/// `compress` calls are still found.
#[derive(Debug, Default)]
pub struct CrleCompressor {
    data: Vec<u8>,
}

impl CrleCompressor {
    pub fn new() -> Self {
        Self::default()
    }
}

fn write_scattered(out: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    write_uvarint(out, KIND_SCATTERED);
    write_uvarint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Encode `data` as a complete stream.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    let mut scattered_start = 0;
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        let run = data[i..].iter().take_while(|&&b| b == byte).count();
        if run >= MIN_REPEATED {
            write_scattered(&mut out, &data[scattered_start..i]);
            write_uvarint(&mut out, KIND_REPEATED);
            write_uvarint(&mut out, run as u64);
            out.push(byte);
            scattered_start = i + run;
        }
        i += run;
    }

    write_scattered(&mut out, &data[scattered_start..]);
    out
}

impl Compress for CrleCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.data.extend_from_slice(data);
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
        let out = encode(&self.data);
        self.data.clear();
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Kind,
    Size { repeated: bool },
    Scattered { remaining: u64 },
    RepeatedValue { size: u64 },
    Fill { byte: u8, remaining: u64 },
}

#[derive(Debug)]
pub struct CrleDecompressor {
    length: u64,
    fed: u64,
    input: Vec<u8>,
    pos: usize,
    state: State,
    starved: bool,
}

impl CrleDecompressor {
    pub fn new(length: u64) -> Self {
        Self {
            length,
            fed: 0,
            input: Vec::new(),
            pos: 0,
            state: State::Kind,
            starved: true,
        }
    }

    fn available(&self) -> &[u8] {
        &self.input[self.pos..]
    }

    /// Parse a record field. `None` means more input is needed.
    fn field(&mut self) -> Result<Option<u64>, CodecError> {
        match read_uvarint(self.available())? {
            Some((value, n)) => {
                self.pos += n;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Decompress for CrleDecompressor {
    fn needs_input(&self) -> bool {
        !self.is_exhausted() && self.starved
    }

    fn is_exhausted(&self) -> bool {
        self.fed >= self.length && self.pos == self.input.len() && self.state == State::Kind
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.input.drain(..self.pos);
        self.pos = 0;
        let room = self.length.saturating_sub(self.fed);
        let take = chunk.len().min(usize::try_from(room).unwrap_or(usize::MAX));
        self.input.extend_from_slice(&chunk[..take]);
        self.fed += take as u64;
        self.starved = false;
    }

    fn decompress(&mut self, max_len: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(max_len.min(64 * 1024));

        while out.len() < max_len {
            let room = (max_len - out.len()) as u64;
            match self.state {
                State::Kind => {
                    let Some(kind) = self.field()? else {
                        self.starved = true;
                        break;
                    };
                    self.state = match kind {
                        KIND_SCATTERED => State::Size { repeated: false },
                        KIND_REPEATED => State::Size { repeated: true },
                        other => {
                            return Err(CodecError::corrupt(
                                CODEC,
                                format!("unknown record kind {other}"),
                            ));
                        }
                    };
                }
                State::Size { repeated } => {
                    let Some(size) = self.field()? else {
                        self.starved = true;
                        break;
                    };
                    self.state = match (repeated, size) {
                        (true, size) => State::RepeatedValue { size },
                        (false, 0) => State::Kind,
                        (false, remaining) => State::Scattered { remaining },
                    };
                }
                State::Scattered { remaining } => {
                    let available = self.available();
                    if available.is_empty() {
                        self.starved = true;
                        break;
                    }
                    let n = remaining.min(room).min(available.len() as u64) as usize;
                    out.extend_from_slice(&available[..n]);
                    self.pos += n;
                    let remaining = remaining - n as u64;
                    self.state = if remaining == 0 {
                        State::Kind
                    } else {
                        State::Scattered { remaining }
                    };
                }
                State::RepeatedValue { size } => {
                    let Some(&byte) = self.available().first() else {
                        self.starved = true;
                        break;
                    };
                    self.pos += 1;
                    self.state = if size == 0 {
                        State::Kind
                    } else {
                        State::Fill {
                            byte,
                            remaining: size,
                        }
                    };
                }
                State::Fill { byte, remaining } => {
                    let n = remaining.min(room);
                    out.resize(out.len() + n as usize, byte);
                    let remaining = remaining - n;
                    self.state = if remaining == 0 {
                        State::Kind
                    } else {
                        State::Fill { byte, remaining }
                    };
                }
            }
        }

        Ok(out)
    }
}
