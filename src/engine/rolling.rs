// Rolling block checksum and source block table.
//
// The checksum is Adler-style (running low and high sums) over a spread of
// each byte, truncated to 16 bits per half, so it can slide one byte at a
// time. The table keeps one source offset per bucket; the first block to
// land in a bucket wins, which favors earlier source offsets.

/// Offset added to stored positions so 0 means "empty bucket".
const EMPTY_OFFSET: u64 = 1;

/// Largest table, in log2 buckets.
const MAX_TABLE_BITS: u32 = 24;

#[inline]
fn spread(byte: u8) -> u32 {
    // Offset by one so zero bytes still move the sums.
    (u32::from(byte) + 1).wrapping_mul(0x9e37) & 0xffff
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockHash {
    width: usize,
    width_u32: u32,
}

impl BlockHash {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            width_u32: width as u32,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Checksum of the first `width` bytes of `base`.
    pub fn checksum(&self, base: &[u8]) -> u32 {
        debug_assert!(base.len() >= self.width);
        let mut low: u32 = 0;
        let mut high: u32 = 0;
        for &b in &base[..self.width] {
            low = low.wrapping_add(spread(b));
            high = high.wrapping_add(low);
        }
        ((high & 0xffff) << 16) | (low & 0xffff)
    }

    /// Slide one byte: remove `base[0]`, add `base[width]`.
    pub fn update(&self, old: u32, base: &[u8]) -> u32 {
        debug_assert!(base.len() > self.width);
        let out = spread(base[0]);
        let inc = spread(base[self.width]);
        let low = old.wrapping_sub(out).wrapping_add(inc) & 0xffff;
        let high = (old >> 16)
            .wrapping_sub(out.wrapping_mul(self.width_u32))
            .wrapping_add(low)
            & 0xffff;
        (high << 16) | low
    }
}

pub(crate) struct BlockTable {
    buckets: Vec<u64>,
    mask: u32,
}

impl BlockTable {
    /// Index every whole `hash.width()` block of `source`.
    pub fn build(source: &[u8], hash: &BlockHash) -> Self {
        let width = hash.width();
        let blocks = source.len() / width.max(1);
        let bits = (blocks.max(1) * 2)
            .next_power_of_two()
            .trailing_zeros()
            .min(MAX_TABLE_BITS);
        let mut table = Self {
            buckets: vec![0; 1 << bits],
            mask: (1u32 << bits) - 1,
        };
        for block in 0..blocks {
            let pos = block * width;
            table.insert(hash.checksum(&source[pos..]), pos);
        }
        table
    }

    fn bucket(&self, cksum: u32) -> usize {
        let mixed = cksum ^ (cksum >> 15) ^ (cksum >> 7);
        (mixed & self.mask) as usize
    }

    fn insert(&mut self, cksum: u32, pos: usize) {
        let bucket = self.bucket(cksum);
        if self.buckets[bucket] == 0 {
            self.buckets[bucket] = pos as u64 + EMPTY_OFFSET;
        }
    }

    /// Source offset stored for `cksum`, if any. May be a collision.
    pub fn lookup(&self, cksum: u32) -> Option<usize> {
        match self.buckets[self.bucket(cksum)] {
            0 => None,
            stored => Some((stored - EMPTY_OFFSET) as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_matches_fresh_checksum() {
        let data: Vec<u8> = (0..500u32).map(|i| (i * 31 % 256) as u8).collect();
        for width in [1, 4, 16, 64] {
            let hash = BlockHash::new(width);
            let mut rolled = hash.checksum(&data);
            for pos in 0..data.len() - width {
                rolled = hash.update(rolled, &data[pos..]);
                assert_eq!(rolled, hash.checksum(&data[pos + 1..]), "width {width} pos {pos}");
            }
        }
    }

    #[test]
    fn zero_block_is_not_zero() {
        let hash = BlockHash::new(8);
        assert_ne!(hash.checksum(&[0; 8]), 0);
    }

    #[test]
    fn table_finds_blocks() {
        let source: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let hash = BlockHash::new(32);
        let table = BlockTable::build(&source, &hash);
        let mut found = 0;
        for block in 0..source.len() / 32 {
            let pos = block * 32;
            if let Some(hit) = table.lookup(hash.checksum(&source[pos..])) {
                if source[hit..hit + 32] == source[pos..pos + 32] {
                    found += 1;
                }
            }
        }
        // Bucket collisions may hide a few blocks, never most of them.
        assert!(found > 64, "found {found}");
    }

    #[test]
    fn first_block_wins() {
        let source = [7u8; 64];
        let hash = BlockHash::new(16);
        let table = BlockTable::build(&source, &hash);
        assert_eq!(table.lookup(hash.checksum(&source)), Some(0));
    }

    #[test]
    fn empty_source() {
        let hash = BlockHash::new(16);
        let table = BlockTable::build(&[], &hash);
        assert_eq!(table.lookup(hash.checksum(&[1; 16])), None);
    }
}
