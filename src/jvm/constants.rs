//! Constant pool entries of the class file format.
use crate::error::ClassFormatError;
use crate::jvm::reader::{ClassReader, ParseResult};
use crate::jvm::writer::ClassWriter;

/// Constant pool tags.
pub mod cp_tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const INVOKE_DYNAMIC: u8 = 18;
}

/// Contents of a Utf8 entry as UTF-16 code units. Class files may hold
/// unpaired surrogates, which `as_str` shows as U+FFFD; `units` keeps them.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct JavaStr {
    units: Vec<u16>,
    text: String,
}

impl JavaStr {
    pub fn from_units(units: Vec<u16>) -> Self {
        let text = String::from_utf16_lossy(&units);
        Self { units, text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }
}

impl From<&str> for JavaStr {
    fn from(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
            text: text.to_string(),
        }
    }
}

impl std::fmt::Debug for JavaStr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.text, f)
    }
}

/// One constant pool entry. Floating point values keep their raw bits so
/// that decoding and encoding are lossless (NaN payloads included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CPInfo {
    /// Index 0 and the second index of a long or double entry.
    Unusable,
    ConstantUtf8 {
        value: JavaStr,
    },
    ConstantInteger {
        value: i32,
    },
    ConstantFloat {
        bytes: u32,
    },
    ConstantLong {
        value: i64,
    },
    ConstantDouble {
        bytes: u64,
    },
    ConstantClass {
        name_index: u16,
    },
    ConstantString {
        string_index: u16,
    },
    ConstantFieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantInterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantNameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
}

impl CPInfo {
    /// Long and double entries take two constant pool indices.
    pub fn is_wide(&self) -> bool {
        matches!(self, CPInfo::ConstantLong { .. } | CPInfo::ConstantDouble { .. })
    }

    pub fn tag(&self) -> Option<u8> {
        let tag = match self {
            CPInfo::Unusable => return None,
            CPInfo::ConstantUtf8 { .. } => cp_tag::UTF8,
            CPInfo::ConstantInteger { .. } => cp_tag::INTEGER,
            CPInfo::ConstantFloat { .. } => cp_tag::FLOAT,
            CPInfo::ConstantLong { .. } => cp_tag::LONG,
            CPInfo::ConstantDouble { .. } => cp_tag::DOUBLE,
            CPInfo::ConstantClass { .. } => cp_tag::CLASS,
            CPInfo::ConstantString { .. } => cp_tag::STRING,
            CPInfo::ConstantFieldRef { .. } => cp_tag::FIELDREF,
            CPInfo::ConstantMethodRef { .. } => cp_tag::METHODREF,
            CPInfo::ConstantInterfaceMethodRef { .. } => cp_tag::INTERFACE_METHODREF,
            CPInfo::ConstantNameAndType { .. } => cp_tag::NAME_AND_TYPE,
        };
        Some(tag)
    }

    fn write(&self, w: &mut ClassWriter) {
        let Some(tag) = self.tag() else {
            return;
        };
        w.write_u8(tag);
        match self {
            CPInfo::Unusable => {}
            CPInfo::ConstantUtf8 { value } => {
                let encoded = encode_modified_utf8(value.units());
                w.write_u16(encoded.len() as u16);
                w.write_bytes(&encoded);
            }
            CPInfo::ConstantInteger { value } => w.write_u32(*value as u32),
            CPInfo::ConstantFloat { bytes } => w.write_u32(*bytes),
            CPInfo::ConstantLong { value } => w.write_u64(*value as u64),
            CPInfo::ConstantDouble { bytes } => w.write_u64(*bytes),
            CPInfo::ConstantClass { name_index } => w.write_u16(*name_index),
            CPInfo::ConstantString { string_index } => w.write_u16(*string_index),
            CPInfo::ConstantFieldRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantMethodRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantInterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                w.write_u16(*class_index);
                w.write_u16(*name_and_type_index);
            }
            CPInfo::ConstantNameAndType {
                name_index,
                descriptor_index,
            } => {
                w.write_u16(*name_index);
                w.write_u16(*descriptor_index);
            }
        }
    }
}

/// Parse the constant pool. The returned vector is indexed exactly like
/// the class file: entry 0 and the upper half of wide entries are
/// [`CPInfo::Unusable`].
pub fn parse_constant_pool(reader: &mut ClassReader) -> ParseResult<Vec<CPInfo>> {
    let count = reader.read_u16()?;
    let mut pool = Vec::with_capacity(count as usize);
    pool.push(CPInfo::Unusable);
    let mut index = 1u16;
    while index < count {
        let entry = parse_constant(reader, index)?;
        let wide = entry.is_wide();
        pool.push(entry);
        index += 1;
        if wide {
            if index >= count {
                return Err(ClassFormatError::InvalidIndex {
                    index,
                    message: "wide constant overruns the pool".to_string(),
                });
            }
            pool.push(CPInfo::Unusable);
            index += 1;
        }
    }
    validate_constant_pool(&pool)?;
    Ok(pool)
}

fn parse_constant(reader: &mut ClassReader, index: u16) -> ParseResult<CPInfo> {
    let tag = reader.read_u8()?;
    let entry = match tag {
        cp_tag::UTF8 => {
            let len = reader.read_u16()? as usize;
            let raw = reader.read_bytes(len)?;
            let units = decode_modified_utf8(&raw).ok_or(ClassFormatError::InvalidUtf8 { index })?;
            CPInfo::ConstantUtf8 {
                value: JavaStr::from_units(units),
            }
        }
        cp_tag::INTEGER => CPInfo::ConstantInteger {
            value: reader.read_u32()? as i32,
        },
        cp_tag::FLOAT => CPInfo::ConstantFloat {
            bytes: reader.read_u32()?,
        },
        cp_tag::LONG => CPInfo::ConstantLong {
            value: reader.read_u64()? as i64,
        },
        cp_tag::DOUBLE => CPInfo::ConstantDouble {
            bytes: reader.read_u64()?,
        },
        cp_tag::CLASS => CPInfo::ConstantClass {
            name_index: reader.read_u16()?,
        },
        cp_tag::STRING => CPInfo::ConstantString {
            string_index: reader.read_u16()?,
        },
        cp_tag::FIELDREF => CPInfo::ConstantFieldRef {
            class_index: reader.read_u16()?,
            name_and_type_index: reader.read_u16()?,
        },
        cp_tag::METHODREF => CPInfo::ConstantMethodRef {
            class_index: reader.read_u16()?,
            name_and_type_index: reader.read_u16()?,
        },
        cp_tag::INTERFACE_METHODREF => CPInfo::ConstantInterfaceMethodRef {
            class_index: reader.read_u16()?,
            name_and_type_index: reader.read_u16()?,
        },
        cp_tag::NAME_AND_TYPE => CPInfo::ConstantNameAndType {
            name_index: reader.read_u16()?,
            descriptor_index: reader.read_u16()?,
        },
        // MethodHandle, MethodType and InvokeDynamic are recognized but
        // never linked; anything else is garbage.
        _ => return Err(ClassFormatError::UnsupportedTag { tag, index }),
    };
    Ok(entry)
}

/// Check that every index stored inside the pool points at an entry of
/// the expected kind.
fn validate_constant_pool(pool: &[CPInfo]) -> ParseResult<()> {
    let expect = |index: u16, what: &str, ok: fn(&CPInfo) -> bool| -> ParseResult<()> {
        match pool.get(index as usize) {
            Some(entry) if ok(entry) => Ok(()),
            _ => Err(ClassFormatError::InvalidIndex {
                index,
                message: format!("expected {what}"),
            }),
        }
    };
    let is_utf8 = |e: &CPInfo| matches!(e, CPInfo::ConstantUtf8 { .. });
    let is_class = |e: &CPInfo| matches!(e, CPInfo::ConstantClass { .. });
    let is_nat = |e: &CPInfo| matches!(e, CPInfo::ConstantNameAndType { .. });

    for entry in pool {
        match entry {
            CPInfo::ConstantClass { name_index } => expect(*name_index, "Utf8", is_utf8)?,
            CPInfo::ConstantString { string_index } => expect(*string_index, "Utf8", is_utf8)?,
            CPInfo::ConstantFieldRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantMethodRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantInterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                expect(*class_index, "Class", is_class)?;
                expect(*name_and_type_index, "NameAndType", is_nat)?;
            }
            CPInfo::ConstantNameAndType {
                name_index,
                descriptor_index,
            } => {
                expect(*name_index, "Utf8", is_utf8)?;
                expect(*descriptor_index, "Utf8", is_utf8)?;
            }
            _ => {}
        }
    }
    Ok(())
}

pub(crate) fn write_constant_pool(pool: &[CPInfo], w: &mut ClassWriter) {
    w.write_u16(pool.len() as u16);
    for entry in pool.iter().skip(1) {
        entry.write(w);
    }
}

/// Decode the JVM's modified UTF-8: `NUL` is two bytes and supplementary
/// characters are encoded as surrogate pairs. Surrogates need not pair up.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<Vec<u16>> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            if b == 0 {
                return None;
            }
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push(
                (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16,
            );
            i += 3;
        } else {
            return None;
        }
    }
    Some(units)
}

pub fn encode_modified_utf8(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len());
    for &unit in units {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(count: u16, body: &[u8]) -> Vec<u8> {
        let mut data = count.to_be_bytes().to_vec();
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn wide_entries_take_two_indices() {
        // #1 = Long 7, #3 = Integer 5
        let data = pool_bytes(
            4,
            &[5, 0, 0, 0, 0, 0, 0, 0, 7, 3, 0, 0, 0, 5],
        );
        let pool = parse_constant_pool(&mut ClassReader::new(&data)).unwrap();
        assert_eq!(pool.len(), 4);
        assert_eq!(pool[1], CPInfo::ConstantLong { value: 7 });
        assert_eq!(pool[2], CPInfo::Unusable);
        assert_eq!(pool[3], CPInfo::ConstantInteger { value: 5 });
    }

    #[test]
    fn rejects_unimplemented_tags() {
        // MethodType pointing at #1.
        let data = pool_bytes(2, &[16, 0, 1]);
        assert_eq!(
            parse_constant_pool(&mut ClassReader::new(&data)),
            Err(ClassFormatError::UnsupportedTag { tag: 16, index: 1 })
        );
        let data = pool_bytes(2, &[2, 0, 1]);
        assert!(parse_constant_pool(&mut ClassReader::new(&data)).is_err());
    }

    #[test]
    fn rejects_dangling_class_index() {
        // #1 = Class #5 in a pool of one entry.
        let data = pool_bytes(2, &[7, 0, 5]);
        assert!(matches!(
            parse_constant_pool(&mut ClassReader::new(&data)),
            Err(ClassFormatError::InvalidIndex { index: 5, .. })
        ));
    }

    #[test]
    fn modified_utf8_handles_nul_and_supplementary() {
        let text = JavaStr::from("a\u{0}é€😀");
        let encoded = encode_modified_utf8(text.units());
        // NUL is two bytes and the emoji is a six byte surrogate pair.
        assert_eq!(&encoded[1..3], &[0xC0, 0x80]);
        assert_eq!(encoded.len(), 1 + 2 + 2 + 3 + 6);
        assert_eq!(decode_modified_utf8(&encoded).as_deref(), Some(text.units()));
        assert_eq!(decode_modified_utf8(&[0x00]), None);
        assert_eq!(decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]), None);
    }

    #[test]
    fn unpaired_surrogates_are_kept() {
        // #1 = Utf8 "\uD800", as javac writes a lone high surrogate.
        let data = pool_bytes(2, &[1, 0, 3, 0xED, 0xA0, 0x80]);
        let pool = parse_constant_pool(&mut ClassReader::new(&data)).unwrap();
        let CPInfo::ConstantUtf8 { value } = &pool[1] else {
            panic!("expected Utf8, got {:?}", pool[1]);
        };
        assert_eq!(value.units(), &[0xD800]);
        assert_eq!(value.as_str(), "\u{FFFD}");

        let mut w = ClassWriter::new();
        write_constant_pool(&pool, &mut w);
        assert_eq!(w.into_bytes(), data);
    }

    #[test]
    fn pool_round_trips() {
        let pool = vec![
            CPInfo::Unusable,
            CPInfo::ConstantUtf8 {
                value: JavaStr::from("Main"),
            },
            CPInfo::ConstantClass { name_index: 1 },
            CPInfo::ConstantDouble {
                bytes: f64::NAN.to_bits() | 1,
            },
            CPInfo::Unusable,
            CPInfo::ConstantFloat {
                bytes: (-0.0f32).to_bits(),
            },
        ];
        let mut w = ClassWriter::new();
        write_constant_pool(&pool, &mut w);
        let bytes = w.into_bytes();
        let decoded = parse_constant_pool(&mut ClassReader::new(&bytes)).unwrap();
        assert_eq!(decoded, pool);
    }
}
