//! Class file encoder, the inverse of [`JVMParser`](crate::jvm::JVMParser).
use byteorder::{BigEndian, ByteOrder};

use crate::jvm::attributes::write_attributes;
use crate::jvm::constants::write_constant_pool;
use crate::jvm::{JVMClassFile, MemberInfo};

/// Growable big-endian output buffer.
#[derive(Debug, Default)]
pub struct ClassWriter {
    buf: Vec<u8>,
}

impl ClassWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut tmp = [0u8; 2];
        BigEndian::write_u16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut tmp = [0u8; 4];
        BigEndian::write_u32(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut tmp = [0u8; 8];
        BigEndian::write_u64(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a `u4` length prefix followed by `bytes`.
    pub fn write_length_prefixed(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn write_member(member: &MemberInfo, w: &mut ClassWriter) {
    w.write_u16(member.access_flags);
    w.write_u16(member.name_index);
    w.write_u16(member.descriptor_index);
    write_attributes(&member.attributes, w);
}

impl JVMClassFile {
    /// Serialize the class file. Attribute lengths are recomputed from
    /// their contents.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ClassWriter::new();
        w.write_u32(self.magic);
        w.write_u16(self.minor_version);
        w.write_u16(self.major_version);
        write_constant_pool(&self.constant_pool, &mut w);
        w.write_u16(self.access_flags);
        w.write_u16(self.this_class);
        w.write_u16(self.super_class);
        w.write_u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            w.write_u16(*interface);
        }
        w.write_u16(self.fields.len() as u16);
        for field in &self.fields {
            write_member(field, &mut w);
        }
        w.write_u16(self.methods.len() as u16);
        for method in &self.methods {
            write_member(method, &mut w);
        }
        write_attributes(&self.attributes, &mut w);
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_big_endian() {
        let mut w = ClassWriter::new();
        w.write_u32(0xCAFEBABE);
        w.write_u16(0x0034);
        w.write_length_prefixed(&[1, 2]);
        assert_eq!(
            w.into_bytes(),
            vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0, 0, 0, 2, 1, 2]
        );
    }
}
