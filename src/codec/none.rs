// Pass-through codec. The payload is the raw patch itself.

use super::{CodecError, Compress, Decompress};

#[derive(Debug, Default)]
pub struct NoneCompressor;

impl NoneCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compress for NoneCompressor {
    fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn flush(&mut self) -> Result<Vec<u8>, CodecError> {
        Ok(Vec::new())
    }
}

/// Copies input to output until `length` bytes have gone through.
#[derive(Debug)]
pub struct NoneDecompressor {
    length: u64,
    produced: u64,
    pending: Vec<u8>,
}

impl NoneDecompressor {
    pub fn new(length: u64) -> Self {
        Self {
            length,
            produced: 0,
            pending: Vec::new(),
        }
    }

    fn accepted(&self) -> u64 {
        self.produced + self.pending.len() as u64
    }
}

impl Decompress for NoneDecompressor {
    fn needs_input(&self) -> bool {
        !self.is_exhausted() && self.pending.is_empty()
    }

    fn is_exhausted(&self) -> bool {
        self.produced >= self.length
    }

    fn feed(&mut self, chunk: &[u8]) {
        // Bytes beyond the declared length are not part of the payload.
        let room = self.length.saturating_sub(self.accepted());
        let take = chunk.len().min(usize::try_from(room).unwrap_or(usize::MAX));
        self.pending.extend_from_slice(&chunk[..take]);
    }

    fn decompress(&mut self, max_len: usize) -> Result<Vec<u8>, CodecError> {
        let n = max_len.min(self.pending.len());
        let out: Vec<u8> = self.pending.drain(..n).collect();
        self.produced += n as u64;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_is_identity() {
        let mut c = NoneCompressor::new();
        assert_eq!(c.compress(b"abc").unwrap(), b"abc");
        assert!(c.flush().unwrap().is_empty());
    }

    #[test]
    fn decompress_respects_length() {
        let mut d = NoneDecompressor::new(5);
        assert!(d.needs_input());
        d.feed(b"hello world");
        assert!(!d.needs_input());
        assert_eq!(d.decompress(3).unwrap(), b"hel");
        assert_eq!(d.decompress(100).unwrap(), b"lo");
        assert!(d.is_exhausted());
        assert!(!d.needs_input());
    }

    #[test]
    fn empty_payload_is_exhausted_immediately() {
        let d = NoneDecompressor::new(0);
        assert!(d.is_exhausted());
        assert!(!d.needs_input());
    }
}
