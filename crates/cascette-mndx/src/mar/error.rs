//! Error types for MAR name database parsing and traversal

use thiserror::Error;

/// Errors that can occur when loading or walking a MAR database
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarError {
    /// Input ended before a section was complete
    #[error("Truncated MAR data at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        /// Offset where the read started
        offset: usize,
        /// Bytes requested
        needed: usize,
        /// Bytes left in the input
        available: usize,
    },

    /// Buffer does not start with `MAR\0`
    #[error("Invalid MAR signature: {0:#010x}")]
    InvalidMagic(u32),

    /// Array byte length is not a multiple of its item size or exceeds 32 bits
    #[error("Invalid array length {length} for item size {item_size}")]
    InvalidArrayLength {
        /// Declared length in bytes
        length: u64,
        /// Size of one array item
        item_size: usize,
    },

    /// Sparse array declares more set items than items
    #[error("Sparse array declares {valid} set items out of {total}")]
    InconsistentCounts {
        /// Declared number of set bits
        valid: u32,
        /// Declared number of bits
        total: u32,
    },

    /// Rank checkpoint table does not cover the declared bits
    #[error("Sparse array has {found} rank checkpoints, expected at least {expected}")]
    MissingCheckpoints {
        /// Minimum number of checkpoints
        expected: usize,
        /// Number found in the stream
        found: usize,
    },

    /// Backing words are too short for the declared contents
    #[error("Backing words hold {available_bits} bits, {required_bits} required")]
    InsufficientWords {
        /// Bits needed by the declared contents
        required_bits: u64,
        /// Bits provided by the backing words
        available_bits: u64,
    },

    /// Bit-packed array declares a width above 32 bits
    #[error("Invalid bit-packed entry width: {0}")]
    InvalidBitWidth(u32),

    /// Bit-packed array mask does not match its width
    #[error("Bit-packed mask {mask:#010x} does not match width {bits}")]
    InvalidBitMask {
        /// Declared entry width
        bits: u32,
        /// Declared mask
        mask: u32,
    },

    /// Bit-packed array entry count exceeds 32 bits
    #[error("Invalid bit-packed entry count: {0}")]
    InvalidEntryCount(u64),

    /// Fragment table slot count is zero or not a power of two
    #[error("Invalid fragment table size: {0}")]
    InvalidFragmentTable(usize),

    /// Configuration mask holds unknown values
    #[error("Invalid trie configuration mask: {0:#010x}")]
    InvalidConfig(u32),

    /// More chained tiers than the configuration can express
    #[error("Too many chained tiers: {0}")]
    TierLimitExceeded(usize),

    /// Runtime navigation hit data inconsistent with the structure
    #[error("Corrupt MAR structure: {0}")]
    CorruptStructure(&'static str),
}

/// Result type for MAR operations
pub type Result<T> = std::result::Result<T, MarError>;
