//! Fragment store for multi-character labels
//!
//! Fragments are either NUL-terminated (text mode) or delimited by an
//! end-mark array whose set bit flags each fragment's last byte (binary mode).

use crate::mar::bit_vector::SparseArray;
use crate::mar::error::{MarError, Result};
use crate::mar::search::SearchCursor;
use crate::mar::stream::ByteStream;

/// Blob of shared label fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentStore {
    bytes: Vec<u8>,
    end_marks: SparseArray,
}

impl FragmentStore {
    /// Read the fragment blob and its end-mark array
    pub fn parse(stream: &mut ByteStream<'_>) -> Result<Self> {
        let bytes = stream.read_bytes()?;
        let end_marks = SparseArray::parse(stream)?;
        Ok(Self { bytes, end_marks })
    }

    /// Whether this tier stores no fragments of its own
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether fragments end at marked bytes instead of NUL
    pub fn uses_end_marks(&self) -> bool {
        !self.end_marks.is_empty()
    }

    /// Size of the blob in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Fragment starting at `offset`
    pub fn fragment(&self, offset: u32) -> Result<&[u8]> {
        let start = offset as usize;
        if start >= self.bytes.len() {
            return Err(MarError::CorruptStructure("fragment offset beyond store"));
        }

        let end = if self.uses_end_marks() {
            let mut position = offset;
            while !self.end_marks.is_present(position) {
                position += 1;
                if position >= self.end_marks.len() {
                    return Err(MarError::CorruptStructure("fragment without end mark"));
                }
            }
            position as usize + 1
        } else {
            self.bytes[start..]
                .iter()
                .position(|&b| b == 0)
                .map(|length| start + length)
                .ok_or(MarError::CorruptStructure("fragment without terminator"))?
        };

        if end <= start || end > self.bytes.len() {
            return Err(MarError::CorruptStructure("empty or overlong fragment"));
        }
        Ok(&self.bytes[start..end])
    }

    /// Match the fragment against the query; a mismatch or an exhausted query
    /// before the fragment ends is a miss
    pub fn matches(&self, offset: u32, cursor: &mut SearchCursor) -> Result<bool> {
        for &expected in self.fragment(offset)? {
            if cursor.peek() != Some(expected) {
                return Ok(false);
            }
            cursor.advance();
        }
        Ok(true)
    }

    /// Match the fragment while query bytes remain, appending matched bytes
    /// and then the unmatched rest of the fragment to the path
    pub fn match_and_copy(&self, offset: u32, cursor: &mut SearchCursor) -> Result<bool> {
        let fragment = self.fragment(offset)?;
        for (i, &expected) in fragment.iter().enumerate() {
            match cursor.peek() {
                None => {
                    cursor.extend(&fragment[i..]);
                    return Ok(true);
                }
                Some(byte) if byte == expected => {
                    cursor.advance();
                    cursor.push(byte);
                }
                Some(_) => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Append the whole fragment to the path
    pub fn copy(&self, offset: u32, cursor: &mut SearchCursor) -> Result<()> {
        cursor.extend(self.fragment(offset)?);
        Ok(())
    }
}
