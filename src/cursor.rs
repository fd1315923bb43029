use byteorder::{ByteOrder, LittleEndian};

use crate::error::ReadError;

/// Advance-and-read primitives over a borrowed byte region.
///
/// All structured reads in the file go through a cursor; reading past the
/// end of the region is a structural error carrying the name of the
/// structure that was being decoded.
#[derive(Clone, Copy, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Take `len` raw bytes and advance.
    pub fn take_bytes(&mut self, len: usize, what: ReadError) -> Result<&'a [u8], ReadError> {
        if self.remaining() < len {
            return Err(what);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize, what: ReadError) -> Result<(), ReadError> {
        self.take_bytes(len, what).map(|_| ())
    }

    pub fn take_u16(&mut self, what: ReadError) -> Result<u16, ReadError> {
        let bytes = self.take_bytes(2, what)?;
        Ok(LittleEndian::read_u16(bytes))
    }

    pub fn take_u32(&mut self, what: ReadError) -> Result<u32, ReadError> {
        let bytes = self.take_bytes(4, what)?;
        Ok(LittleEndian::read_u32(bytes))
    }

    pub fn take_u64(&mut self, what: ReadError) -> Result<u64, ReadError> {
        let bytes = self.take_bytes(8, what)?;
        Ok(LittleEndian::read_u64(bytes))
    }
}
