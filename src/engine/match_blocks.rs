// Match-blocks delta engine.
//
// Raw patch layout: a sequence of segments, each
//
//   diff_len:VarSize   diff bytes   (target - source, byte-wise wrapping)
//   extra_len:VarSize  extra bytes  (copied verbatim)
//   adjust:VarSize                  (signed seek applied to the source cursor)
//
// Applying starts with the source cursor at 0. Diff bytes are added to the
// source bytes under the cursor, which then advances by `diff_len`; extra
// bytes are appended as-is; finally the cursor moves by `adjust`.
//
// Matches are found by indexing source blocks of `match_block_size` bytes
// with a rolling checksum and sliding the same checksum over the target.
// A hit is extended backwards byte-exactly and forwards while equal bytes
// keep outnumbering differing ones, so near-identical regions become one
// diff run of mostly zero bytes.

use log::debug;

use super::rolling::{BlockHash, BlockTable};
use super::{DeltaEngine, DeltaParams, EngineError};
use crate::format::FORMAT_MATCH_BLOCKS;
use crate::format::varsize;

/// Bytes scanned past the best forward extension before giving up.
const EXTEND_SLACK: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchBlocks;

impl MatchBlocks {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Match {
    source: usize,
    target: usize,
    len: usize,
}

impl Match {
    fn target_end(&self) -> usize {
        self.target + self.len
    }

    fn source_end(&self) -> usize {
        self.source + self.len
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

struct SegmentWriter<'a> {
    source: &'a [u8],
    target: &'a [u8],
    out: Vec<u8>,
    pending: Option<Match>,
    segments: usize,
}

impl<'a> SegmentWriter<'a> {
    fn new(source: &'a [u8], target: &'a [u8]) -> Self {
        Self {
            source,
            target,
            out: Vec::with_capacity(target.len() / 4 + 16),
            pending: None,
            segments: 0,
        }
    }

    /// Target offset covered so far.
    fn covered(&self) -> usize {
        self.pending.map_or(0, |m| m.target_end())
    }

    fn push(&mut self, next: Match) {
        let extra_end = next.target;
        self.write_segment(extra_end, next.source);
        self.pending = Some(next);
    }

    fn finish(mut self) -> Vec<u8> {
        let source_end = self.pending.map_or(0, |m| m.source_end());
        self.write_segment(self.target.len(), source_end);
        debug!("match blocks: {} segments, {} raw bytes", self.segments, self.out.len());
        self.out
    }

    /// Emit the pending diff, the extra bytes up to `extra_end`, and the
    /// seek that brings the source cursor to `next_source`.
    fn write_segment(&mut self, extra_end: usize, next_source: usize) {
        let (diff_source, diff_target, diff_len) = match self.pending {
            Some(m) => (m.source, m.target, m.len),
            None => (0, 0, 0),
        };

        push_size(&mut self.out, diff_len);
        self.out.extend(
            self.target[diff_target..diff_target + diff_len]
                .iter()
                .zip(&self.source[diff_source..diff_source + diff_len])
                .map(|(t, s)| t.wrapping_sub(*s)),
        );

        let extra_start = diff_target + diff_len;
        push_size(&mut self.out, extra_end - extra_start);
        self.out
            .extend_from_slice(&self.target[extra_start..extra_end]);

        let cursor = diff_source + diff_len;
        let adjust = next_source as i64 - cursor as i64;
        let mut buf = [0u8; varsize::MAX_VARSIZE_LEN];
        let n = varsize::encode_i64(adjust, &mut buf);
        self.out.extend_from_slice(&buf[..n]);
        self.segments += 1;
    }
}

fn push_size(out: &mut Vec<u8>, size: usize) {
    let mut buf = [0u8; varsize::MAX_VARSIZE_LEN];
    let n = varsize::encode_i64(size as i64, &mut buf);
    out.extend_from_slice(&buf[..n]);
}

/// Grow a verified block hit at (`source`, `target`) into a full match.
/// Returns the match and its score (equal minus differing bytes).
fn extend(
    source: &[u8],
    target: &[u8],
    hit_source: usize,
    hit_target: usize,
    block: usize,
    floor: usize,
) -> (Match, i64) {
    let back = source[..hit_source]
        .iter()
        .rev()
        .zip(target[floor..hit_target].iter().rev())
        .take_while(|(s, t)| s == t)
        .count();
    let start_source = hit_source - back;
    let start_target = hit_target - back;

    let limit = (source.len() - start_source).min(target.len() - start_target);
    let exact = back + block;
    let mut best_len = exact;
    let mut best_score = exact as i64;
    let mut score = best_score;
    let mut since_best = 0;

    for i in exact..limit {
        if source[start_source + i] == target[start_target + i] {
            score += 1;
        } else {
            score -= 1;
        }
        if score > best_score {
            best_score = score;
            best_len = i + 1;
            since_best = 0;
        } else {
            since_best += 1;
            if since_best > EXTEND_SLACK {
                break;
            }
        }
    }

    let m = Match {
        source: start_source,
        target: start_target,
        len: best_len,
    };
    (m, best_score)
}

fn compute(source: &[u8], target: &[u8], params: &DeltaParams) -> Result<Vec<u8>, EngineError> {
    if params.format_version != FORMAT_MATCH_BLOCKS {
        return Err(EngineError::UnsupportedFormat(params.format_version));
    }
    let block = params.match_block_size;
    if block == 0 {
        return Err(EngineError::InvalidParams(
            "match block size must be at least 1".into(),
        ));
    }
    if target.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = SegmentWriter::new(source, target);
    if source.len() < block || target.len() < block {
        return Ok(writer.finish());
    }

    let hash = BlockHash::new(block);
    let table = BlockTable::build(source, &hash);
    let min_score = i64::from(params.match_score);
    let mut pos = 0;
    let mut cksum = hash.checksum(target);

    loop {
        let mut jumped = false;
        if let Some(hit) = table.lookup(cksum)
            && source[hit..hit + block] == target[pos..pos + block]
        {
            let (m, score) = extend(source, target, hit, pos, block, writer.covered());
            if score >= min_score {
                writer.push(m);
                pos = m.target_end();
                jumped = true;
            }
        }

        if jumped {
            if pos + block > target.len() {
                break;
            }
            cksum = hash.checksum(&target[pos..]);
        } else {
            if pos + block >= target.len() {
                break;
            }
            cksum = hash.update(cksum, &target[pos..]);
            pos += 1;
        }
    }

    Ok(writer.finish())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_value(&mut self, field: &str) -> Result<i64, EngineError> {
        let (value, n) = varsize::read_i64(&self.data[self.pos..])
            .map_err(|e| EngineError::Malformed(format!("{field}: {e}")))?;
        self.pos += n;
        Ok(value)
    }

    fn read_len(&mut self, field: &str) -> Result<usize, EngineError> {
        let value = self.read_value(field)?;
        usize::try_from(value)
            .map_err(|_| EngineError::Malformed(format!("{field}: negative length {value}")))
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], EngineError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                EngineError::Malformed(format!(
                    "{field}: {len} bytes at offset {} run past the end",
                    self.pos
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

fn apply(source: &[u8], patch: &[u8]) -> Result<Vec<u8>, EngineError> {
    let mut cursor = Cursor {
        data: patch,
        pos: 0,
    };
    let mut out = Vec::with_capacity(source.len());
    let mut from: i64 = 0;

    while !cursor.is_empty() {
        let diff_len = cursor.read_len("diff length")?;
        let diff = cursor.take(diff_len, "diff data")?;
        if diff_len > 0 {
            let start = usize::try_from(from)
                .map_err(|_| EngineError::Malformed(format!("source cursor {from} before start")))?;
            let window = start
                .checked_add(diff_len)
                .and_then(|end| source.get(start..end))
                .ok_or_else(|| {
                    EngineError::Malformed(format!(
                        "diff of {diff_len} bytes at source offset {start} exceeds source of {} bytes",
                        source.len()
                    ))
                })?;
            out.extend(diff.iter().zip(window).map(|(d, s)| s.wrapping_add(*d)));
            from += diff_len as i64;
        }

        let extra_len = cursor.read_len("extra length")?;
        out.extend_from_slice(cursor.take(extra_len, "extra data")?);

        let adjust = cursor.read_value("adjustment")?;
        from = from
            .checked_add(adjust)
            .ok_or_else(|| EngineError::Malformed("source cursor overflow".into()))?;
    }

    Ok(out)
}

impl DeltaEngine for MatchBlocks {
    fn compute_delta(
        &self,
        source: &[u8],
        target: &[u8],
        params: &DeltaParams,
    ) -> Result<Vec<u8>, EngineError> {
        compute(source, target, params)
    }

    fn apply_delta(&self, source: &[u8], patch: &[u8]) -> Result<Vec<u8>, EngineError> {
        apply(source, patch)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
