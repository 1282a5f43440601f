//! Open-addressed transition cache

use crate::mar::error::{MarError, Result};
use crate::mar::stream::ByteStream;

/// One cached transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentTableEntry {
    /// Node the transition leaves from
    pub parent: u32,
    /// Node the transition leads to
    pub child: u32,
    /// Fragment link, or a literal byte when the top 24 bits are all set
    pub link: u32,
}

impl FragmentTableEntry {
    /// Serialized size in bytes
    pub const SIZE: usize = 12;

    const LITERAL_MARK: u32 = 0xFFFF_FF00;

    /// Slot that never matches a node
    pub const EMPTY: Self = Self {
        parent: u32::MAX,
        child: u32::MAX,
        link: 0,
    };

    /// Entry for a single-byte label
    pub const fn literal(parent: u32, child: u32, label: u8) -> Self {
        Self {
            parent,
            child,
            link: Self::LITERAL_MARK | label as u32,
        }
    }

    /// Entry for a fragment label
    pub const fn fragment(parent: u32, child: u32, link: u32) -> Self {
        Self {
            parent,
            child,
            link,
        }
    }

    /// The literal label, if this entry is not a fragment link
    pub const fn label(&self) -> Option<u8> {
        if self.link & Self::LITERAL_MARK == Self::LITERAL_MARK {
            Some(self.link as u8)
        } else {
            None
        }
    }

    fn decode(raw: &[u8; Self::SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Self {
            parent: word(0),
            child: word(4),
            link: word(8),
        }
    }
}

/// Power-of-two table of cached transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentTable {
    entries: Vec<FragmentTableEntry>,
    mask: u32,
}

impl FragmentTable {
    /// Read the table; the slot count must be a non-zero power of two
    pub fn parse(stream: &mut ByteStream<'_>) -> Result<Self> {
        let entries = stream.read_records(FragmentTableEntry::decode)?;
        if !entries.len().is_power_of_two() {
            return Err(MarError::InvalidFragmentTable(entries.len()));
        }

        let mask = (entries.len() - 1) as u32;
        Ok(Self { entries, mask })
    }

    /// Slot for the transition from `node` on byte `label`
    pub const fn slot(node: u32, label: u8, mask: u32) -> u32 {
        ((node << 5) ^ node ^ label as u32) & mask
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a parsed table
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot mask
    pub const fn mask(&self) -> u32 {
        self.mask
    }

    /// Entry probed when leaving `node` on byte `label`
    pub fn forward(&self, node: u32, label: u8) -> &FragmentTableEntry {
        &self.entries[Self::slot(node, label, self.mask) as usize]
    }

    /// Entry probed when climbing from `node` to its parent
    pub fn reverse(&self, node: u32) -> &FragmentTableEntry {
        &self.entries[(node & self.mask) as usize]
    }
}
