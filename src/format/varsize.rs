// Signed variable-length size fields.
//
// Little-endian base-128 with a sign bit folded into the first byte:
//
//   first byte:  [more:1][sign:1][value bits 0..6]
//   next bytes:  [more:1][7 more value bits]
//
// The final byte has `more` clear. Encoding is always minimal; decoding
// accepts redundant zero groups as long as the value still fits.

use std::io::{self, Read, Write};

use crate::error::{Error, FormatError, Result};

/// Maximum encoded length of an `i64` (6 + 9 * 7 = 69 bits >= 64).
pub const MAX_VARSIZE_LEN: usize = 10;

const CONTINUATION_BIT: u8 = 0x80;
const SIGN_BIT: u8 = 0x40;
const FIRST_VALUE_MASK: u8 = 0x3f;
const FIRST_VALUE_BITS: u32 = 6;
const GROUP_MASK: u8 = 0x7f;
const GROUP_BITS: u32 = 7;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `value` into `buf`, returning the number of bytes written (1..=10).
pub fn encode_i64(value: i64, buf: &mut [u8; MAX_VARSIZE_LEN]) -> usize {
    let mut magnitude = value.unsigned_abs();
    let mut byte = magnitude as u8 & FIRST_VALUE_MASK;
    if value < 0 {
        byte |= SIGN_BIT;
    }
    magnitude >>= FIRST_VALUE_BITS;

    let mut len = 0;
    while magnitude != 0 {
        buf[len] = byte | CONTINUATION_BIT;
        len += 1;
        byte = magnitude as u8 & GROUP_MASK;
        magnitude >>= GROUP_BITS;
    }
    buf[len] = byte;
    len + 1
}

/// Encode `value` into a freshly allocated vector.
pub fn encode(value: i64) -> Vec<u8> {
    let mut buf = [0u8; MAX_VARSIZE_LEN];
    let len = encode_i64(value, &mut buf);
    buf[..len].to_vec()
}

/// Encode `value` and write it to `w`.
pub fn write_i64<W: Write + ?Sized>(w: &mut W, value: i64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARSIZE_LEN];
    let len = encode_i64(value, &mut buf);
    w.write_all(&buf[..len])
}

/// Write a non-negative size. Values above `i64::MAX` cannot be represented.
pub fn write_size<W: Write + ?Sized>(w: &mut W, size: u64) -> Result<()> {
    let value = i64::try_from(size).map_err(|_| FormatError::SizeOverflow)?;
    write_i64(w, value)?;
    Ok(())
}

/// Number of bytes `encode_i64` would produce for `value`.
pub fn sizeof_i64(value: i64) -> usize {
    let mut magnitude = value.unsigned_abs() >> FIRST_VALUE_BITS;
    let mut len = 1;
    while magnitude != 0 {
        magnitude >>= GROUP_BITS;
        len += 1;
    }
    len
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Incremental decoder state shared by the slice and stream readers.
struct Accumulator {
    negative: bool,
    magnitude: u64,
    shift: u32,
    len: usize,
}

impl Accumulator {
    /// Start from the first byte. Returns the state and whether more bytes follow.
    fn start(byte: u8) -> (Self, bool) {
        let acc = Self {
            negative: byte & SIGN_BIT != 0,
            magnitude: u64::from(byte & FIRST_VALUE_MASK),
            shift: FIRST_VALUE_BITS,
            len: 1,
        };
        (acc, byte & CONTINUATION_BIT != 0)
    }

    fn push(&mut self, byte: u8) -> Result<bool, FormatError> {
        self.len += 1;
        if self.len > MAX_VARSIZE_LEN {
            return Err(FormatError::SizeOverflow);
        }
        let group = u64::from(byte & GROUP_MASK);
        if group != 0 {
            if self.shift >= u64::BITS || (group << self.shift) >> self.shift != group {
                return Err(FormatError::SizeOverflow);
            }
            self.magnitude |= group << self.shift;
        }
        self.shift += GROUP_BITS;
        Ok(byte & CONTINUATION_BIT != 0)
    }

    fn finish(self) -> Result<i64, FormatError> {
        if self.negative {
            if self.magnitude > i64::MIN.unsigned_abs() {
                return Err(FormatError::SizeOverflow);
            }
            // 2^63 wraps onto i64::MIN, which is exactly the value we want.
            Ok((self.magnitude as i64).wrapping_neg())
        } else {
            i64::try_from(self.magnitude).map_err(|_| FormatError::SizeOverflow)
        }
    }
}

/// Decode a value from the start of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_i64(data: &[u8]) -> Result<(i64, usize), FormatError> {
    let (&first, rest) = data.split_first().ok_or(FormatError::MissingSizeByte)?;
    let (mut acc, mut more) = Accumulator::start(first);
    let mut bytes = rest.iter();
    while more {
        let &byte = bytes.next().ok_or(FormatError::TruncatedSize)?;
        more = acc.push(byte)?;
    }
    let consumed = acc.len;
    Ok((acc.finish()?, consumed))
}

/// Read a value from a streaming source, one byte at a time.
///
/// End of stream before the first byte is `MissingSizeByte`; inside the
/// field it is `TruncatedSize`. Other read failures surface as `Error::Io`.
pub fn stream_read_i64<R: Read + ?Sized>(r: &mut R) -> Result<i64> {
    let first = read_byte(r)?.ok_or(FormatError::MissingSizeByte)?;
    let (mut acc, mut more) = Accumulator::start(first);
    while more {
        let byte = read_byte(r)?.ok_or(FormatError::TruncatedSize)?;
        more = acc.push(byte)?;
    }
    Ok(acc.finish()?)
}

/// Read a size field that must not be negative. `field` names it in errors.
pub fn read_size<R: Read + ?Sized>(r: &mut R, field: &'static str) -> Result<u64> {
    let value = stream_read_i64(r)?;
    u64::try_from(value).map_err(|_| Error::Format(FormatError::NegativeSize { field, value }))
}

/// Read one byte, retrying on `Interrupted`. `None` at end of stream.
pub(crate) fn read_byte<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn single_byte_values() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(1), [0x01]);
        assert_eq!(encode(63), [0x3f]);
        assert_eq!(encode(-1), [0x41]);
        assert_eq!(encode(-63), [0x7f]);
    }

    #[test]
    fn multi_byte_values() {
        assert_eq!(encode(64), [0x80, 0x01]);
        assert_eq!(encode(1000), [0xa8, 0x0f]);
        assert_eq!(encode(-64), [0xc0, 0x01]);
        assert_eq!(encode(8191), [0xbf, 0x7f]);
        assert_eq!(encode(8192), [0x80, 0x80, 0x01]);
    }

    #[test]
    fn extremes_roundtrip_minimally() {
        for value in [i64::MAX, i64::MIN, i64::MIN + 1, 1 << 40, -(1 << 40)] {
            let bytes = encode(value);
            assert_eq!(bytes.len(), sizeof_i64(value));
            assert_eq!(read_i64(&bytes).unwrap(), (value, bytes.len()));
            assert_eq!(bytes.last().unwrap() & CONTINUATION_BIT, 0);
        }
        assert_eq!(encode(i64::MIN).len(), MAX_VARSIZE_LEN);
    }

    #[test]
    fn sizeof_matches_encode() {
        let mut value = 1i64;
        for _ in 0..62 {
            assert_eq!(sizeof_i64(value), encode(value).len(), "value {value}");
            assert_eq!(sizeof_i64(-value), encode(-value).len(), "value {}", -value);
            value <<= 1;
        }
    }

    #[test]
    fn negative_zero_decodes_as_zero() {
        assert_eq!(read_i64(&[0x40]).unwrap(), (0, 1));
    }

    #[test]
    fn trailing_bytes_are_not_consumed() {
        assert_eq!(read_i64(&[0xa8, 0x0f, 0xff, 0xff]).unwrap(), (1000, 2));
    }

    #[test]
    fn missing_and_truncated_fields() {
        assert_eq!(read_i64(&[]), Err(FormatError::MissingSizeByte));
        assert_eq!(read_i64(&[0x80]), Err(FormatError::TruncatedSize));
        assert_eq!(read_i64(&[0x80, 0x81]), Err(FormatError::TruncatedSize));
    }

    #[test]
    fn overflow_is_rejected() {
        // Eleven bytes can never be valid.
        let mut long = vec![0x80u8; 10];
        long.push(0x00);
        assert_eq!(read_i64(&long), Err(FormatError::SizeOverflow));

        // 2^63 as a positive value does not fit i64.
        let mut big = vec![0x80u8];
        big.extend_from_slice(&[0x80; 8]);
        big.push(0x02);
        assert_eq!(read_i64(&big), Err(FormatError::SizeOverflow));

        // ... but as a negative value it is exactly i64::MIN.
        big[0] |= SIGN_BIT;
        assert_eq!(read_i64(&big).unwrap(), (i64::MIN, 10));
    }

    #[test]
    fn stream_read_reports_position_of_truncation() {
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert!(matches!(
            stream_read_i64(&mut empty),
            Err(Error::Format(FormatError::MissingSizeByte))
        ));

        let mut cut = Cursor::new(vec![0x80, 0x80]);
        assert!(matches!(
            stream_read_i64(&mut cut),
            Err(Error::Format(FormatError::TruncatedSize))
        ));
    }

    #[test]
    fn stream_read_leaves_following_bytes() {
        let mut cursor = Cursor::new(vec![0xa8, 0x0f, 0x05]);
        assert_eq!(stream_read_i64(&mut cursor).unwrap(), 1000);
        assert_eq!(stream_read_i64(&mut cursor).unwrap(), 5);
    }

    #[test]
    fn read_size_rejects_negative() {
        let mut cursor = Cursor::new(encode(-5));
        let err = read_size(&mut cursor, "target").unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::NegativeSize { field: "target", value: -5 })
        ));
    }

    #[test]
    fn write_size_rejects_huge() {
        let mut out = Vec::new();
        assert!(write_size(&mut out, u64::MAX).is_err());
        write_size(&mut out, 70).unwrap();
        assert_eq!(out, [0x86, 0x01]);
    }
}
