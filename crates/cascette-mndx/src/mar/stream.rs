//! Cursor over a serialized MAR buffer
//!
//! Every array in the stream is stored as a 64-bit byte length, the payload
//! and zero padding up to the next 8-byte boundary.

use crate::mar::error::{MarError, Result};

/// Forward-only reader over an in-memory MAR buffer
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteStream<'a> {
    /// Create a stream positioned at the start of `data`
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read offset
    pub const fn position(&self) -> usize {
        self.offset
    }

    /// Bytes left to read
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Borrow the next `count` bytes and advance past them
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(MarError::Truncated {
                offset: self.offset,
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    /// Advance past `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a length-prefixed array and return its payload, consuming padding
    pub fn read_array(&mut self, item_size: usize) -> Result<&'a [u8]> {
        let length = self.read_u64()?;
        if length > u64::from(u32::MAX) || length % item_size as u64 != 0 {
            return Err(MarError::InvalidArrayLength { length, item_size });
        }

        let length = length as usize;
        let payload = self.take(length)?;
        self.skip((8 - length % 8) % 8)?;
        Ok(payload)
    }

    /// Read a length-prefixed byte array
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_array(1).map(<[u8]>::to_vec)
    }

    /// Read a length-prefixed array of little-endian `u32`
    pub fn read_u32_array(&mut self) -> Result<Vec<u32>> {
        let payload = self.read_array(4)?;
        Ok(payload
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Read a length-prefixed array of fixed-size records
    pub fn read_records<T, const N: usize>(
        &mut self,
        decode: impl Fn(&[u8; N]) -> T,
    ) -> Result<Vec<T>> {
        let payload = self.read_array(N)?;
        Ok(payload
            .chunks_exact(N)
            .map(|chunk| {
                let mut record = [0u8; N];
                record.copy_from_slice(chunk);
                decode(&record)
            })
            .collect())
    }
}
