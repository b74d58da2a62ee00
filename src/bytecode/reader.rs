//! Repositionable cursor over a method's code array.
use byteorder::{BigEndian, ByteOrder};

use crate::error::{ClassFormatError, Result};

#[derive(Debug, Clone, Copy)]
pub struct BytecodeReader<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> BytecodeReader<'a> {
    pub fn new(code: &'a [u8], pc: usize) -> Self {
        Self { code, pc }
    }

    /// Point the reader at another code array.
    pub fn reset(&mut self, code: &'a [u8], pc: usize) {
        self.code = code;
        self.pc = pc;
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .code
            .get(self.pc..self.pc + len)
            .ok_or(ClassFormatError::Truncated {
                offset: self.pc as u64,
            })?;
        self.pc += len;
        Ok(bytes)
    }

    pub fn read_u1(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i1(&mut self) -> Result<i8> {
        Ok(self.read_u1()? as i8)
    }

    pub fn read_u2(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i2(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_i4(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Read `n` consecutive `i4` values.
    pub fn read_i4s(&mut self, n: usize) -> Result<Vec<i32>> {
        (0..n).map(|_| self.read_i4()).collect()
    }

    /// Skip to the next multiple of four, as `tableswitch` and
    /// `lookupswitch` operands are aligned on the start of the code array.
    pub fn skip_padding(&mut self) {
        while self.pc % 4 != 0 {
            self.pc += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_operands() {
        let code = [0x10, 0xff, 0x11, 0x80, 0x00, 0x12, 0x00, 0x00, 0x00, 0x01, 0xff, 0xff, 0xff, 0xfe];
        let mut reader = BytecodeReader::new(&code, 0);
        assert_eq!(reader.read_u1().unwrap(), 0x10);
        assert_eq!(reader.read_i1().unwrap(), -1);
        assert_eq!(reader.read_u1().unwrap(), 0x11);
        assert_eq!(reader.read_i2().unwrap(), i16::MIN);
        assert_eq!(reader.pc(), 5);
        reader.set_pc(6);
        assert_eq!(reader.read_i4s(2).unwrap(), vec![1, -2]);
        assert!(reader.read_u1().is_err());
    }

    #[test]
    fn padding_aligns_to_four() {
        let code = [0u8; 16];
        let mut reader = BytecodeReader::new(&code, 1);
        reader.skip_padding();
        assert_eq!(reader.pc(), 4);
        reader.skip_padding();
        assert_eq!(reader.pc(), 4);
        reader.reset(&code, 7);
        reader.skip_padding();
        assert_eq!(reader.pc(), 8);
    }
}
