//! MNDX header and MAR info records

use crate::root::error::{MndxError, Result};
use binrw::{BinRead, BinWrite};

/// Number of name databases an MNDX root carries
pub const MAR_FILE_COUNT: usize = 3;

/// MNDX root file header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct MndxHeader {
    /// `MNDX`
    pub magic: [u8; 4],
    /// Header layout version (at most 2)
    pub header_version: u32,
    /// Format version (1 or 2)
    pub format_version: u32,
    /// Two extra fields present only in version 2 headers
    #[br(if(header_version == 2))]
    pub extended: Option<[u32; 2]>,
    /// Offset of the MAR info table
    pub mar_info_offset: u32,
    /// Number of MAR info records
    pub mar_info_count: u32,
    /// Size of one MAR info record
    pub mar_info_size: u32,
    /// Offset of the root entry array
    pub entries_offset: u32,
    /// Number of root entries
    pub entries_total: u32,
    /// Number of distinct names with entries
    pub entries_valid: u32,
    /// Size of one root entry
    pub entry_size: u32,
}

impl MndxHeader {
    /// `MNDX`
    pub const MAGIC: [u8; 4] = *b"MNDX";
    /// Required MAR info record size
    pub const MAR_INFO_SIZE: u32 = 20;
    /// Required root entry size
    pub const ENTRY_SIZE: u32 = 24;

    /// Create a version 1 header for the given layout
    pub fn new(
        format_version: u32,
        mar_info_offset: u32,
        entries_offset: u32,
        entries_total: u32,
        entries_valid: u32,
    ) -> Self {
        Self {
            magic: Self::MAGIC,
            header_version: 1,
            format_version,
            extended: None,
            mar_info_offset,
            mar_info_count: MAR_FILE_COUNT as u32,
            mar_info_size: Self::MAR_INFO_SIZE,
            entries_offset,
            entries_total,
            entries_valid,
            entry_size: Self::ENTRY_SIZE,
        }
    }

    /// Serialized size of this header
    pub const fn size(&self) -> usize {
        if self.extended.is_some() { 48 } else { 40 }
    }

    /// Check signature, versions and record sizes
    pub fn validate(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(MndxError::InvalidMagic(self.magic));
        }
        if self.header_version > 2 || !(1..=2).contains(&self.format_version) {
            return Err(MndxError::UnsupportedVersion {
                header_version: self.header_version,
                format_version: self.format_version,
            });
        }
        if self.mar_info_count as usize > MAR_FILE_COUNT
            || self.mar_info_size != Self::MAR_INFO_SIZE
        {
            return Err(MndxError::InvalidMarInfo {
                count: self.mar_info_count,
                size: self.mar_info_size,
            });
        }
        if self.entry_size != Self::ENTRY_SIZE {
            return Err(MndxError::InvalidEntrySize(self.entry_size));
        }
        Ok(())
    }
}

/// Location of one MAR database inside the root file
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct MarInfo {
    /// Database slot (0 packages, 1 stripped names, 2 full names)
    pub index: u32,
    /// Low 32 bits of the size
    pub size: u32,
    /// High 32 bits of the size
    pub size_hi: u32,
    /// Low 32 bits of the offset
    pub offset: u32,
    /// High 32 bits of the offset
    pub offset_hi: u32,
}

impl MarInfo {
    /// Create a record for a database below 4 GiB
    pub const fn new(index: u32, offset: u32, size: u32) -> Self {
        Self {
            index,
            size,
            size_hi: 0,
            offset,
            offset_hi: 0,
        }
    }

    /// Full 64-bit offset
    pub const fn data_offset(&self) -> u64 {
        ((self.offset_hi as u64) << 32) | self.offset as u64
    }

    /// Full 64-bit size
    pub const fn data_size(&self) -> u64 {
        ((self.size_hi as u64) << 32) | self.size as u64
    }
}
