//! Error types for MNDX root file parsing

use crate::mar::MarError;
use thiserror::Error;

/// Errors that can occur when parsing an MNDX root file
#[derive(Error, Debug)]
pub enum MndxError {
    /// File does not start with `MNDX`
    #[error("Invalid MNDX signature: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Header or format version outside the supported range
    #[error("Unsupported MNDX version: header {header_version}, format {format_version}")]
    UnsupportedVersion {
        /// Header layout version
        header_version: u32,
        /// Format version
        format_version: u32,
    },

    /// MAR info table has an unexpected shape
    #[error("Invalid MAR info table: {count} records of {size} bytes")]
    InvalidMarInfo {
        /// Declared record count
        count: u32,
        /// Declared record size
        size: u32,
    },

    /// One of the three name databases is absent
    #[error("Missing MAR database {0}")]
    MissingMarFile(usize),

    /// Root entries have an unexpected size
    #[error("Invalid root entry size: {0}")]
    InvalidEntrySize(u32),

    /// A section points outside the file
    #[error("{section} at offset {offset} with size {size} lies outside the {available}-byte file")]
    DataOutOfRange {
        /// Section name
        section: &'static str,
        /// Section offset
        offset: u64,
        /// Section size
        size: u64,
        /// File size
        available: usize,
    },

    /// Stripped-name database disagrees with the valid entry count
    #[error("Name database holds {names} names, header declares {valid} valid entries")]
    NameCountMismatch {
        /// Names in the database
        names: u32,
        /// Valid entries in the header
        valid: u32,
    },

    /// Entry groups do not line up with the valid entry count
    #[error("Found {groups} root entry groups, expected {expected}")]
    EntryGroupMismatch {
        /// Groups found
        groups: usize,
        /// Groups expected
        expected: u32,
    },

    /// Name database error
    #[error("MAR database error: {0}")]
    Mar(#[from] MarError),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for MNDX operation results
pub type Result<T> = std::result::Result<T, MndxError>;
