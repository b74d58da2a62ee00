//! Positioned big-endian cursor over class file bytes.
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::ClassFormatError;

pub type ParseResult<T> = std::result::Result<T, ClassFormatError>;

/// `ClassReader` reads class file structures sequentially. Every read
/// fails with [`ClassFormatError::Truncated`] when the input runs out.
#[derive(Debug, Clone)]
pub struct ClassReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Byte offset of the next read.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    fn truncated(&self, offset: u64) -> ClassFormatError {
        ClassFormatError::Truncated { offset }
    }

    pub fn read_u8(&mut self) -> ParseResult<u8> {
        let offset = self.position();
        self.cursor.read_u8().map_err(|_| self.truncated(offset))
    }

    pub fn read_u16(&mut self) -> ParseResult<u16> {
        let offset = self.position();
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated(offset))
    }

    pub fn read_u32(&mut self) -> ParseResult<u32> {
        let offset = self.position();
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| self.truncated(offset))
    }

    pub fn read_u64(&mut self) -> ParseResult<u64> {
        let offset = self.position();
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| self.truncated(offset))
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> ParseResult<Vec<u8>> {
        let offset = self.position();
        if self.remaining() < len {
            return Err(self.truncated(offset));
        }
        let mut buf = vec![0u8; len];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.truncated(offset))?;
        Ok(buf)
    }

    /// Read a `u4` length followed by that many bytes.
    pub fn read_length_prefixed(&mut self) -> ParseResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Read a `u2` count followed by that many entries parsed by `f`.
    pub fn read_table<T, F>(&mut self, mut f: F) -> ParseResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> ParseResult<T>,
    {
        let count = self.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(f(self)?);
        }
        Ok(entries)
    }
}
