//! Rank-indexed sparse array
//!
//! A succinct bit vector with a rank checkpoint every 512 bits and select
//! hints every 512 set (or clear) bits. The trie uses it three ways: as the
//! LOUDS node layout, as the terminal-node set and as the set of nodes whose
//! label is a multi-character fragment.
//!
//! Each checkpoint stores the number of set bits before its block plus seven
//! cumulative counts for the 64-bit sub-blocks 1..=7, packed into two words
//! with widths 7/8/8/9/9/9/9.

use crate::mar::error::{MarError, Result};
use crate::mar::stream::ByteStream;

/// Logical bits covered by one rank checkpoint
pub const BLOCK_BITS: u32 = 512;

/// Set bits (or clear bits) between two select hints
pub const SELECT_INTERVAL: u32 = 512;

/// Block-count threshold below which select scans checkpoints linearly
const LINEAR_SCAN_LIMIT: usize = 10;

/// `SELECT_TABLE[rank * 256 + byte]` is the position of the `rank`-th set bit
/// in `byte`, or 7 when the byte has fewer set bits.
pub static SELECT_TABLE: [u8; 2048] = build_select_table();

const fn build_select_table() -> [u8; 2048] {
    let mut table = [7u8; 2048];
    let mut byte = 0;
    while byte < 256 {
        let mut rank = 0;
        let mut bit = 0;
        while bit < 8 {
            if byte & (1 << bit) != 0 {
                table[rank * 256 + byte] = bit as u8;
                rank += 1;
            }
            bit += 1;
        }
        byte += 1;
    }
    table
}

/// Rank checkpoint for one 512-bit block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankCheckpoint {
    /// Set bits before this block
    pub abs: u32,
    lo: u32,
    hi: u32,
}

impl RankCheckpoint {
    /// Serialized size in bytes
    pub const SIZE: usize = 12;

    /// Create a checkpoint from its base count and packed sub-block words
    pub const fn new(abs: u32, lo: u32, hi: u32) -> Self {
        Self { abs, lo, hi }
    }

    /// Build a checkpoint from the seven sub-block counts
    pub const fn from_counts(abs: u32, rel: [u32; 7]) -> Self {
        let lo = (rel[0] & 0x7F)
            | ((rel[1] & 0xFF) << 7)
            | ((rel[2] & 0xFF) << 15)
            | ((rel[3] & 0x1FF) << 23);
        let hi = (rel[4] & 0x1FF) | ((rel[5] & 0x1FF) << 9) | ((rel[6] & 0x1FF) << 18);
        Self { abs, lo, hi }
    }

    fn decode(raw: &[u8; Self::SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Self::new(word(0), word(4), word(8))
    }

    /// Packed sub-block words `(lo, hi)`
    pub const fn packed(&self) -> (u32, u32) {
        (self.lo, self.hi)
    }

    /// Set bits between the block start and the start of sub-block `k` (1..=7)
    pub const fn rel(&self, k: u32) -> u32 {
        match k {
            1 => self.lo & 0x7F,
            2 => (self.lo >> 7) & 0xFF,
            3 => (self.lo >> 15) & 0xFF,
            4 => self.lo >> 23,
            5 => self.hi & 0x1FF,
            6 => (self.hi >> 9) & 0x1FF,
            7 => (self.hi >> 18) & 0x1FF,
            _ => 0,
        }
    }

    /// Clear bits between the block start and the start of sub-block `k`
    const fn rel_zeros(&self, k: u32) -> u32 {
        (64 * k).wrapping_sub(self.rel(k))
    }
}

/// Succinct bit vector with rank and select support
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseArray {
    words: Vec<u32>,
    total: u32,
    valid: u32,
    ranks: Vec<RankCheckpoint>,
    select0: Vec<u32>,
    select1: Vec<u32>,
}

impl SparseArray {
    /// Read a sparse array from the stream and validate its counts
    pub fn parse(stream: &mut ByteStream<'_>) -> Result<Self> {
        let words = stream.read_u32_array()?;
        let total = stream.read_u32()?;
        let valid = stream.read_u32()?;
        if valid > total {
            return Err(MarError::InconsistentCounts { valid, total });
        }

        let ranks = stream.read_records(RankCheckpoint::decode)?;
        let select0 = stream.read_u32_array()?;
        let select1 = stream.read_u32_array()?;

        let available_bits = words.len() as u64 * 32;
        if available_bits < u64::from(total) {
            return Err(MarError::InsufficientWords {
                required_bits: u64::from(total),
                available_bits,
            });
        }

        let expected = total.div_ceil(BLOCK_BITS) as usize;
        if ranks.len() < expected {
            return Err(MarError::MissingCheckpoints {
                expected,
                found: ranks.len(),
            });
        }

        Ok(Self {
            words,
            total,
            valid,
            ranks,
            select0,
            select1,
        })
    }

    /// Number of logical bits
    pub const fn len(&self) -> u32 {
        self.total
    }

    /// Whether the array holds no bits at all
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of set bits
    pub const fn count_ones(&self) -> u32 {
        self.valid
    }

    /// Number of clear bits
    pub const fn count_zeros(&self) -> u32 {
        self.total - self.valid
    }

    /// Whether bit `index` is set; bits past the end read as clear
    pub fn is_present(&self, index: u32) -> bool {
        if index >= self.total {
            return false;
        }
        self.words
            .get((index / 32) as usize)
            .is_some_and(|word| (word >> (index % 32)) & 1 != 0)
    }

    /// Number of set bits strictly before `index`
    pub fn rank(&self, index: u32) -> Result<u32> {
        if index > self.total {
            return Err(MarError::CorruptStructure("rank index beyond array"));
        }

        let checkpoint = self
            .ranks
            .get((index / BLOCK_BITS) as usize)
            .ok_or(MarError::CorruptStructure("missing rank checkpoint"))?;

        let mut count = checkpoint.abs.wrapping_add(checkpoint.rel((index / 64) % 8));
        let word_index = (index / 32) as usize;
        if index & 32 != 0 {
            count = count.wrapping_add(self.word(word_index - 1)?.count_ones());
        }
        let bit = index % 32;
        if bit != 0 {
            let masked = self.word(word_index)? & ((1u32 << bit) - 1);
            count = count.wrapping_add(masked.count_ones());
        }
        Ok(count)
    }

    /// Position of the `n`-th clear bit (0-based)
    pub fn select_zero(&self, n: u32) -> Result<u32> {
        if n >= self.count_zeros() {
            return Err(MarError::CorruptStructure("select0 beyond clear bit count"));
        }

        let hint = (n / SELECT_INTERVAL) as usize;
        let start = self.hint(&self.select0, hint)?;
        if n % SELECT_INTERVAL == 0 {
            return Ok(start);
        }

        let mut begin = (start / BLOCK_BITS) as usize;
        let mut end = self.hint(&self.select0, hint + 1)?.div_ceil(BLOCK_BITS) as usize;
        if begin + LINEAR_SCAN_LIMIT >= end {
            while n >= self.zeros_before(begin + 1)? {
                begin += 1;
            }
        } else {
            while begin + 1 < end {
                let middle = begin.midpoint(end);
                if n < self.zeros_before(middle)? {
                    end = middle;
                } else {
                    begin = middle;
                }
            }
        }

        let checkpoint = self.checkpoint(begin)?;
        let mut n = n
            .checked_sub(self.zeros_before(begin)?)
            .ok_or(MarError::CorruptStructure("rank checkpoint above select target"))?;
        let mut word_index = begin * 16;

        if n < checkpoint.rel_zeros(4) {
            if n < checkpoint.rel_zeros(2) {
                if n >= checkpoint.rel_zeros(1) {
                    word_index += 2;
                    n -= checkpoint.rel_zeros(1);
                }
            } else if n < checkpoint.rel_zeros(3) {
                word_index += 4;
                n -= checkpoint.rel_zeros(2);
            } else {
                word_index += 6;
                n -= checkpoint.rel_zeros(3);
            }
        } else if n < checkpoint.rel_zeros(6) {
            if n < checkpoint.rel_zeros(5) {
                word_index += 8;
                n -= checkpoint.rel_zeros(4);
            } else {
                word_index += 10;
                n -= checkpoint.rel_zeros(5);
            }
        } else if n < checkpoint.rel_zeros(7) {
            word_index += 12;
            n -= checkpoint.rel_zeros(6);
        } else {
            word_index += 14;
            n -= checkpoint.rel_zeros(7);
        }

        let mut word = !self.word(word_index)?;
        let zeros = word.count_ones();
        if n >= zeros {
            n -= zeros;
            word_index += 1;
            word = !self.word(word_index)?;
        }

        Ok(word_index as u32 * 32 + select_bit(n, word)?)
    }

    /// Position of the `n`-th set bit (0-based)
    pub fn select_one(&self, n: u32) -> Result<u32> {
        if n >= self.valid {
            return Err(MarError::CorruptStructure("select1 beyond set bit count"));
        }

        let hint = (n / SELECT_INTERVAL) as usize;
        let start = self.hint(&self.select1, hint)?;
        if n % SELECT_INTERVAL == 0 {
            return Ok(start);
        }

        let mut begin = (start / BLOCK_BITS) as usize;
        let mut end = self.hint(&self.select1, hint + 1)?.div_ceil(BLOCK_BITS) as usize;
        if begin + LINEAR_SCAN_LIMIT >= end {
            while n >= self.checkpoint(begin + 1)?.abs {
                begin += 1;
            }
        } else {
            while begin + 1 < end {
                let middle = begin.midpoint(end);
                if n < self.checkpoint(middle)?.abs {
                    end = middle;
                } else {
                    begin = middle;
                }
            }
        }

        let checkpoint = self.checkpoint(begin)?;
        let mut n = n
            .checked_sub(checkpoint.abs)
            .ok_or(MarError::CorruptStructure("rank checkpoint above select target"))?;
        let mut word_index = begin * 16;

        if n < checkpoint.rel(4) {
            if n < checkpoint.rel(2) {
                if n >= checkpoint.rel(1) {
                    word_index += 2;
                    n -= checkpoint.rel(1);
                }
            } else if n < checkpoint.rel(3) {
                word_index += 4;
                n -= checkpoint.rel(2);
            } else {
                word_index += 6;
                n -= checkpoint.rel(3);
            }
        } else if n < checkpoint.rel(6) {
            if n < checkpoint.rel(5) {
                word_index += 8;
                n -= checkpoint.rel(4);
            } else {
                word_index += 10;
                n -= checkpoint.rel(5);
            }
        } else if n < checkpoint.rel(7) {
            word_index += 12;
            n -= checkpoint.rel(6);
        } else {
            word_index += 14;
            n -= checkpoint.rel(7);
        }

        let mut word = self.word(word_index)?;
        let ones = word.count_ones();
        if n >= ones {
            n -= ones;
            word_index += 1;
            word = self.word(word_index)?;
        }

        Ok(word_index as u32 * 32 + select_bit(n, word)?)
    }

    fn word(&self, index: usize) -> Result<u32> {
        self.words
            .get(index)
            .copied()
            .ok_or(MarError::CorruptStructure("bit index beyond presence words"))
    }

    fn checkpoint(&self, block: usize) -> Result<&RankCheckpoint> {
        self.ranks
            .get(block)
            .ok_or(MarError::CorruptStructure("missing rank checkpoint"))
    }

    fn hint(&self, hints: &[u32], index: usize) -> Result<u32> {
        hints
            .get(index)
            .copied()
            .ok_or(MarError::CorruptStructure("missing select hint"))
    }

    fn zeros_before(&self, block: usize) -> Result<u32> {
        (block as u32)
            .checked_mul(BLOCK_BITS)
            .and_then(|start| start.checked_sub(self.checkpoint(block).ok()?.abs))
            .ok_or(MarError::CorruptStructure("rank checkpoint exceeds block position"))
    }
}

/// Position of the `n`-th set bit inside `word`
fn select_bit(n: u32, word: u32) -> Result<u32> {
    let mut n = n;
    for byte_index in 0..4 {
        let byte = (word >> (byte_index * 8)) & 0xFF;
        let ones = byte.count_ones();
        if n < ones {
            let entry = SELECT_TABLE
                .get((n * 256 + byte) as usize)
                .ok_or(MarError::CorruptStructure("select table index out of range"))?;
            return Ok(byte_index * 8 + u32::from(*entry));
        }
        n -= ones;
    }
    Err(MarError::CorruptStructure("select remainder beyond word"))
}
