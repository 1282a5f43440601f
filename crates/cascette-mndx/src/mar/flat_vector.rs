//! Fixed-width integers packed into 32-bit words

use crate::mar::error::{MarError, Result};
use crate::mar::stream::ByteStream;

/// Bit-packed array of unsigned integers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitPackedArray {
    words: Vec<u32>,
    bits: u32,
    mask: u32,
    len: u32,
}

impl BitPackedArray {
    /// Mask selecting the low `bits` bits
    pub const fn mask_for(bits: u32) -> u32 {
        if bits == 0 { 0 } else { u32::MAX >> (32 - bits) }
    }

    /// Read the packed words, entry width, mask and entry count
    pub fn parse(stream: &mut ByteStream<'_>) -> Result<Self> {
        let words = stream.read_u32_array()?;

        let bits = stream.read_u32()?;
        if bits > 32 {
            return Err(MarError::InvalidBitWidth(bits));
        }

        let mask = stream.read_u32()?;
        if mask != Self::mask_for(bits) {
            return Err(MarError::InvalidBitMask { bits, mask });
        }

        let len = stream.read_u64()?;
        if len > u64::from(u32::MAX) {
            return Err(MarError::InvalidEntryCount(len));
        }

        let required_bits = u64::from(bits) * len;
        let available_bits = words.len() as u64 * 32;
        if available_bits < required_bits {
            return Err(MarError::InsufficientWords {
                required_bits,
                available_bits,
            });
        }

        Ok(Self {
            words,
            bits,
            mask,
            len: len as u32,
        })
    }

    /// Number of entries
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Whether the array has no entries
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of one entry in bits
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Entry `index`, masked to the entry width
    pub fn get(&self, index: u32) -> Result<u32> {
        if index >= self.len {
            return Err(MarError::CorruptStructure("bit-packed index out of range"));
        }
        if self.bits == 0 {
            return Ok(0);
        }

        let position = u64::from(index) * u64::from(self.bits);
        let word_index = (position / 32) as usize;
        let offset = (position % 32) as u32;

        let first = self.word(word_index)?;
        let value = if offset + self.bits <= 32 {
            first >> offset
        } else {
            // Entry straddles two words
            let second = self.word(word_index + 1)?;
            (first >> offset) | (second << (32 - offset))
        };

        Ok(value & self.mask)
    }

    fn word(&self, index: usize) -> Result<u32> {
        self.words
            .get(index)
            .copied()
            .ok_or(MarError::CorruptStructure("bit-packed word out of range"))
    }
}
