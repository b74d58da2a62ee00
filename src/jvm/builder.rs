//! In-memory class file assembly.
//!
//! Used to synthesize the bootstrap classes the loader falls back on, and
//! handy for writing class files without a Java compiler around.
use crate::jvm::attributes::{AttributeInfo, ExceptionTableEntry};
use crate::jvm::constants::{CPInfo, JavaStr};
use crate::jvm::{AccessFlags, JVMClassFile, MemberInfo, JAVA_MAGIC};

/// Assembles a [`JVMClassFile`], deduplicating constant pool entries.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    class_file: JVMClassFile,
}

impl ClassFileBuilder {
    /// Start a public class called `name` (binary form, `a/b/C`).
    pub fn new(name: &str, super_class: Option<&str>) -> Self {
        let mut builder = Self {
            class_file: JVMClassFile {
                magic: JAVA_MAGIC,
                minor_version: 0,
                major_version: 52,
                constant_pool: vec![CPInfo::Unusable],
                access_flags: (AccessFlags::PUBLIC | AccessFlags::SUPER).bits(),
                this_class: 0,
                super_class: 0,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                attributes: Vec::new(),
            },
        };
        builder.class_file.this_class = builder.class(name);
        if let Some(super_class) = super_class {
            builder.class_file.super_class = builder.class(super_class);
        }
        builder
    }

    pub fn set_access_flags(&mut self, flags: AccessFlags) -> &mut Self {
        self.class_file.access_flags = flags.bits();
        self
    }

    pub fn set_major_version(&mut self, major: u16) -> &mut Self {
        self.class_file.major_version = major;
        self
    }

    fn push_constant(&mut self, entry: CPInfo) -> u16 {
        if let Some(index) = self.class_file.constant_pool.iter().position(|e| e == &entry) {
            return index as u16;
        }
        let index = self.class_file.constant_pool.len() as u16;
        let wide = entry.is_wide();
        self.class_file.constant_pool.push(entry);
        if wide {
            self.class_file.constant_pool.push(CPInfo::Unusable);
        }
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.push_constant(CPInfo::ConstantUtf8 {
            value: JavaStr::from(value),
        })
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.push_constant(CPInfo::ConstantClass { name_index })
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.push_constant(CPInfo::ConstantString { string_index })
    }

    /// String constant over raw UTF-16 code units, surrogates unchecked.
    pub fn string_units(&mut self, units: Vec<u16>) -> u16 {
        let string_index = self.push_constant(CPInfo::ConstantUtf8 {
            value: JavaStr::from_units(units),
        });
        self.push_constant(CPInfo::ConstantString { string_index })
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.push_constant(CPInfo::ConstantInteger { value })
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.push_constant(CPInfo::ConstantFloat {
            bytes: value.to_bits(),
        })
    }

    pub fn long(&mut self, value: i64) -> u16 {
        self.push_constant(CPInfo::ConstantLong { value })
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.push_constant(CPInfo::ConstantDouble {
            bytes: value.to_bits(),
        })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.push_constant(CPInfo::ConstantNameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push_constant(CPInfo::ConstantFieldRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push_constant(CPInfo::ConstantMethodRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push_constant(CPInfo::ConstantInterfaceMethodRef {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.class_file.interfaces.push(index);
        self
    }

    pub fn add_field(&mut self, flags: AccessFlags, name: &str, descriptor: &str) -> &mut Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.class_file.fields.push(MemberInfo {
            access_flags: flags.bits(),
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        self
    }

    /// Add a `public static final int` field seeded by a `ConstantValue`.
    pub fn add_static_constant_int(&mut self, name: &str, value: i32) -> &mut Self {
        let constant_value_index = self.integer(value);
        self.add_constant_field(name, "I", constant_value_index)
    }

    /// Add a `public static final` field whose `ConstantValue` points at
    /// an existing pool entry.
    pub fn add_constant_field(
        &mut self,
        name: &str,
        descriptor: &str,
        constant_value_index: u16,
    ) -> &mut Self {
        let attribute_name_index = self.utf8("ConstantValue");
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.class_file.fields.push(MemberInfo {
            access_flags: (AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL).bits(),
            name_index,
            descriptor_index,
            attributes: vec![AttributeInfo::ConstantValueAttribute {
                attribute_name_index,
                constant_value_index,
            }],
        });
        self
    }

    pub fn add_method(
        &mut self,
        flags: AccessFlags,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) -> &mut Self {
        self.add_method_with_handlers(flags, name, descriptor, max_stack, max_locals, code, Vec::new())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_method_with_handlers(
        &mut self,
        flags: AccessFlags,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        exception_table: Vec<ExceptionTableEntry>,
    ) -> &mut Self {
        let attribute_name_index = self.utf8("Code");
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.class_file.methods.push(MemberInfo {
            access_flags: flags.bits(),
            name_index,
            descriptor_index,
            attributes: vec![AttributeInfo::CodeAttribute {
                attribute_name_index,
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes: Vec::new(),
            }],
        });
        self
    }

    /// Add a method without bytecode, flagged `native`.
    pub fn add_native_method(&mut self, flags: AccessFlags, name: &str, descriptor: &str) -> &mut Self {
        self.add_bodiless_method(flags | AccessFlags::NATIVE, name, descriptor)
    }

    /// Add a method without a `Code` attribute (native or abstract).
    pub fn add_bodiless_method(&mut self, flags: AccessFlags, name: &str, descriptor: &str) -> &mut Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.class_file.methods.push(MemberInfo {
            access_flags: flags.bits(),
            name_index,
            descriptor_index,
            attributes: Vec::new(),
        });
        self
    }

    pub fn set_source_file(&mut self, file: &str) -> &mut Self {
        let attribute_name_index = self.utf8("SourceFile");
        let sourcefile_index = self.utf8(file);
        self.class_file.attributes.push(AttributeInfo::SourceFileAttribute {
            attribute_name_index,
            sourcefile_index,
        });
        self
    }

    pub fn build(&self) -> JVMClassFile {
        self.class_file.clone()
    }
}
