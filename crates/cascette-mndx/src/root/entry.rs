//! MNDX root entries and content keys

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Content key (MD5 of the decoded file)
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentKey([u8; 16]);

impl ContentKey {
    /// Create content key from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse content key from hex string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ContentKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// One root entry: a content key for a name within one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct MndxRootEntry {
    /// Low 24 bits: package index; bit 31: last entry for this name
    pub flags: u32,
    /// Content key of the file
    pub content_key: ContentKey,
    /// Decoded file size in bytes
    pub content_size: u32,
}

impl MndxRootEntry {
    /// Serialized size in bytes
    pub const SIZE: usize = 24;
    /// Set on the last entry of a name's group
    pub const LAST_ENTRY: u32 = 0x8000_0000;
    /// Bits holding the package index
    pub const PACKAGE_MASK: u32 = 0x00FF_FFFF;

    /// Create an entry
    pub const fn new(package: u32, last: bool, content_key: ContentKey, content_size: u32) -> Self {
        let flags = (package & Self::PACKAGE_MASK) | if last { Self::LAST_ENTRY } else { 0 };
        Self {
            flags,
            content_key,
            content_size,
        }
    }

    /// Package this entry belongs to
    pub const fn package_index(&self) -> u32 {
        self.flags & Self::PACKAGE_MASK
    }

    /// Whether this entry ends its name's group
    pub const fn is_last(&self) -> bool {
        self.flags & Self::LAST_ENTRY != 0
    }
}
