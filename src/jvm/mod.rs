//! Lightweight implementation of a parser and decoder for JVM bytecode
//! class files.
//!
//! The parser consumes the class file in the order the format lays it out:
//! magic, versions, constant pool, access flags, this and super class,
//! interfaces, fields, methods and class attributes. It either returns a
//! complete [`JVMClassFile`] or the first structural error it finds.
pub mod attributes;
pub mod builder;
pub mod constants;
pub mod reader;
pub mod writer;

use std::path::Path;

use bitflags::bitflags;

use crate::error::ClassFormatError;
pub use attributes::{
    find_attribute, AttributeInfo, ExceptionTableEntry, LineNumber, StackMapFrame,
    VerificationType,
};
pub use constants::{CPInfo, JavaStr};
use reader::{ClassReader, ParseResult};

/// Java class file magic: 0xCAFEBABE
pub const JAVA_MAGIC: u32 = 0xCAFEBABE;

/// Supported major versions, Java 1.0 through 9.
pub const MIN_MAJOR_VERSION: u16 = 45;
pub const MAX_MAJOR_VERSION: u16 = 53;

bitflags! {
    /// Access flags of classes, fields and methods. Some bits mean
    /// different things depending on where they appear (`SUPER` and
    /// `SYNCHRONIZED`, `VOLATILE` and `BRIDGE`, `TRANSIENT` and `VARARGS`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// Fields and methods share the same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    pub fn access_flags(&self) -> AccessFlags {
        AccessFlags::from_bits_retain(self.access_flags)
    }

    pub fn name_index(&self) -> u16 {
        self.name_index
    }

    pub fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    /// Returns the decoded attribute called `name` if present.
    pub fn get(&self, name: &str) -> Option<&AttributeInfo> {
        find_attribute(&self.attributes, name)
    }
}

/// Structural representation of a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JVMClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    /// Indexed like the class file, slot 0 is [`CPInfo::Unusable`].
    pub constant_pool: Vec<CPInfo>,
    pub access_flags: u16,
    pub this_class: u16,
    /// Zero only for `java/lang/Object`.
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl JVMClassFile {
    pub fn constant_pool(&self) -> &[CPInfo] {
        &self.constant_pool
    }

    pub fn fields(&self) -> &[MemberInfo] {
        &self.fields
    }

    pub fn methods(&self) -> &[MemberInfo] {
        &self.methods
    }

    pub fn access_flags(&self) -> AccessFlags {
        AccessFlags::from_bits_retain(self.access_flags)
    }

    /// Returns the Utf8 constant at `index`.
    pub fn utf8(&self, index: u16) -> Option<&str> {
        utf8_at(&self.constant_pool, index)
    }

    /// Returns the name of the Class constant at `index`.
    pub fn class_name_at(&self, index: u16) -> Option<&str> {
        match self.constant_pool.get(index as usize) {
            Some(CPInfo::ConstantClass { name_index }) => self.utf8(*name_index),
            _ => None,
        }
    }

    /// Binary name of this class, e.g. `java/lang/Object`.
    pub fn class_name(&self) -> Option<&str> {
        self.class_name_at(self.this_class)
    }

    /// Binary name of the super class, `None` for `java/lang/Object`.
    pub fn super_class_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            return None;
        }
        self.class_name_at(self.super_class)
    }

    pub fn interface_names(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .filter_map(|index| self.class_name_at(*index))
            .collect()
    }

    pub fn source_file(&self) -> Option<&str> {
        match find_attribute(&self.attributes, "SourceFile") {
            Some(AttributeInfo::SourceFileAttribute {
                sourcefile_index, ..
            }) => self.utf8(*sourcefile_index),
            _ => None,
        }
    }
}

pub(crate) fn utf8_at(pool: &[CPInfo], index: u16) -> Option<&str> {
    match pool.get(index as usize) {
        Some(CPInfo::ConstantUtf8 { value }) => Some(value.as_str()),
        _ => None,
    }
}

/// Class file parser.
pub struct JVMParser;

impl JVMParser {
    /// Parse a class file from its raw bytes.
    pub fn parse(data: &[u8]) -> ParseResult<JVMClassFile> {
        let mut reader = ClassReader::new(data);

        let magic = reader.read_u32()?;
        if magic != JAVA_MAGIC {
            return Err(ClassFormatError::InvalidMagic { actual: magic });
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
            return Err(ClassFormatError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let constant_pool = constants::parse_constant_pool(&mut reader)?;
        let access_flags = reader.read_u16()?;
        let this_class = reader.read_u16()?;
        let super_class = reader.read_u16()?;
        let interfaces = reader.read_table(|r| r.read_u16())?;
        let fields = reader.read_table(|r| parse_member(r, &constant_pool))?;
        let methods = reader.read_table(|r| parse_member(r, &constant_pool))?;
        let attributes = attributes::parse_attributes(&mut reader, &constant_pool)?;

        if reader.remaining() != 0 {
            return Err(ClassFormatError::TrailingBytes {
                count: reader.remaining(),
            });
        }

        let class_file = JVMClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        validate_class_indices(&class_file)?;
        Ok(class_file)
    }
}

fn parse_member(reader: &mut ClassReader, pool: &[CPInfo]) -> ParseResult<MemberInfo> {
    let access_flags = reader.read_u16()?;
    let name_index = reader.read_u16()?;
    let descriptor_index = reader.read_u16()?;
    for index in [name_index, descriptor_index] {
        if utf8_at(pool, index).is_none() {
            return Err(ClassFormatError::InvalidIndex {
                index,
                message: "member name and descriptor must be Utf8".to_string(),
            });
        }
    }
    let attributes = attributes::parse_attributes(reader, pool)?;
    Ok(MemberInfo {
        access_flags,
        name_index,
        descriptor_index,
        attributes,
    })
}

fn validate_class_indices(class_file: &JVMClassFile) -> ParseResult<()> {
    let check = |index: u16| -> ParseResult<()> {
        match class_file.class_name_at(index) {
            Some(_) => Ok(()),
            None => Err(ClassFormatError::InvalidIndex {
                index,
                message: "expected Class".to_string(),
            }),
        }
    };
    check(class_file.this_class)?;
    if class_file.super_class != 0 {
        check(class_file.super_class)?;
    }
    for index in &class_file.interfaces {
        check(*index)?;
    }
    Ok(())
}

/// Read a class file from disk.
pub fn read_class_file(path: &Path) -> std::io::Result<Vec<u8>> {
    std::fs::read(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::builder::ClassFileBuilder;
    use pretty_assertions::assert_eq;

    fn sample_class() -> JVMClassFile {
        let mut builder = ClassFileBuilder::new("demo/Sample", Some("java/lang/Object"));
        builder.add_interface("demo/Shape");
        builder.add_field(AccessFlags::PRIVATE, "count", "I");
        builder.add_static_constant_int("LIMIT", 42);
        builder.add_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "answer",
            "()I",
            1,
            0,
            vec![0x10, 42, 0xAC],
        );
        builder.add_native_method(AccessFlags::STATIC, "host", "(J)V");
        builder.set_source_file("Sample.java");
        builder.build()
    }

    #[test]
    fn can_parse_built_class() {
        let class_file = sample_class();
        let bytes = class_file.to_bytes();
        assert_eq!(0xcafebabe, u32::from_be_bytes(bytes[..4].try_into().unwrap()));

        let parsed = JVMParser::parse(&bytes).unwrap();
        assert_eq!(parsed.class_name(), Some("demo/Sample"));
        assert_eq!(parsed.super_class_name(), Some("java/lang/Object"));
        assert_eq!(parsed.interface_names(), vec!["demo/Shape"]);
        assert_eq!(parsed.source_file(), Some("Sample.java"));
        assert_eq!(parsed.fields().len(), 2);
        assert_eq!(parsed.methods().len(), 2);
        let answer = &parsed.methods()[0];
        assert_eq!(parsed.utf8(answer.name_index()), Some("answer"));
        assert!(matches!(
            answer.get("Code"),
            Some(AttributeInfo::CodeAttribute { code, .. }) if code == &vec![0x10, 42, 0xAC]
        ));
        assert!(parsed.methods()[1].get("Code").is_none());
    }

    #[test]
    fn decode_encode_is_identity() {
        let mut class_file = sample_class();
        class_file.attributes.push(AttributeInfo::Unknown {
            attribute_name_index: class_file.constant_pool.len() as u16,
            info: vec![1, 2, 3, 4, 5],
        });
        class_file.constant_pool.push(CPInfo::ConstantUtf8 {
            value: JavaStr::from("Deprecated-ish"),
        });
        let bytes = class_file.to_bytes();
        let parsed = JVMParser::parse(&bytes).unwrap();
        assert_eq!(parsed, class_file);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn lone_surrogate_survives_parse() {
        let mut builder = ClassFileBuilder::new("Lone", Some("java/lang/Object"));
        builder.string_units(vec![0xD800]);
        let class_file = builder.build();
        let bytes = class_file.to_bytes();
        assert!(bytes.windows(5).any(|w| w == [0x00, 0x03, 0xED, 0xA0, 0x80]));

        let parsed = JVMParser::parse(&bytes).unwrap();
        assert_eq!(parsed, class_file);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_class().to_bytes();
        bytes[0] = 0xCB;
        assert_eq!(
            JVMParser::parse(&bytes),
            Err(ClassFormatError::InvalidMagic { actual: 0xCBFEBABE })
        );
    }

    #[test]
    fn rejects_unsupported_versions() {
        for major in [44u16, 54, 61] {
            let mut class_file = sample_class();
            class_file.major_version = major;
            assert_eq!(
                JVMParser::parse(&class_file.to_bytes()),
                Err(ClassFormatError::UnsupportedVersion { major, minor: 0 })
            );
        }
        for major in [45u16, 49, 53] {
            let mut class_file = sample_class();
            class_file.major_version = major;
            assert!(JVMParser::parse(&class_file.to_bytes()).is_ok());
        }
    }

    #[test]
    fn rejects_truncated_and_trailing_input() {
        let bytes = sample_class().to_bytes();
        for len in [3, 9, bytes.len() / 2, bytes.len() - 1] {
            assert!(matches!(
                JVMParser::parse(&bytes[..len]),
                Err(ClassFormatError::Truncated { .. })
            ));
        }
        let mut padded = bytes.clone();
        padded.push(0);
        assert_eq!(
            JVMParser::parse(&padded),
            Err(ClassFormatError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn rejects_bad_this_class() {
        let mut class_file = sample_class();
        class_file.this_class = 1;
        assert!(matches!(
            JVMParser::parse(&class_file.to_bytes()),
            Err(ClassFormatError::InvalidIndex { index: 1, .. })
        ));
    }
}
