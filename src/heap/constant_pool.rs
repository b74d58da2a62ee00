//! Runtime constant pool.
use std::rc::{Rc, Weak};

use crate::error::{ClassFormatError, Result, VmError};
use crate::heap::member::upgrade_class;
use crate::heap::symref::{ClassRef, FieldRef, MethodRef};
use crate::heap::{Class, Field, Method};
use crate::jvm::{CPInfo, JVMClassFile, JavaStr};

/// Runtime view of one constant pool entry. Utf8 and NameAndType entries
/// are folded into the references that use them and read as `Empty`.
#[derive(Debug)]
pub enum Constant {
    Empty,
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(JavaStr),
    Class(ClassRef),
    Field(FieldRef),
    Method(MethodRef),
    InterfaceMethod(MethodRef),
}

/// Constant pool of a runtime class, indexed like the class file.
#[derive(Debug)]
pub struct ConstantPool {
    class: Weak<Class>,
    constants: Vec<Constant>,
}

fn invalid(index: u16, message: &str) -> VmError {
    ClassFormatError::InvalidIndex {
        index,
        message: message.to_string(),
    }
    .into()
}

impl ConstantPool {
    /// Convert the structural pool. Member references get their owner
    /// class name, simple name and descriptor copied out up front.
    pub(crate) fn build_constants(class_file: &JVMClassFile) -> Result<Vec<Constant>> {
        let utf8 = |index: u16| -> Result<String> {
            class_file
                .utf8(index)
                .map(str::to_string)
                .ok_or_else(|| invalid(index, "expected Utf8"))
        };
        let class_name = |index: u16| -> Result<String> {
            class_file
                .class_name_at(index)
                .map(str::to_string)
                .ok_or_else(|| invalid(index, "expected Class"))
        };
        let name_and_type = |index: u16| -> Result<(String, String)> {
            match class_file.constant_pool.get(index as usize) {
                Some(CPInfo::ConstantNameAndType {
                    name_index,
                    descriptor_index,
                }) => Ok((utf8(*name_index)?, utf8(*descriptor_index)?)),
                _ => Err(invalid(index, "expected NameAndType")),
            }
        };

        class_file
            .constant_pool
            .iter()
            .map(|entry| {
                let constant = match entry {
                    CPInfo::Unusable | CPInfo::ConstantUtf8 { .. } | CPInfo::ConstantNameAndType { .. } => {
                        Constant::Empty
                    }
                    CPInfo::ConstantInteger { value } => Constant::Integer(*value),
                    CPInfo::ConstantFloat { bytes } => Constant::Float(f32::from_bits(*bytes)),
                    CPInfo::ConstantLong { value } => Constant::Long(*value),
                    CPInfo::ConstantDouble { bytes } => Constant::Double(f64::from_bits(*bytes)),
                    CPInfo::ConstantString { string_index } => match class_file.constant_pool.get(*string_index as usize) {
                        Some(CPInfo::ConstantUtf8 { value }) => Constant::String(value.clone()),
                        _ => return Err(invalid(*string_index, "expected Utf8")),
                    },
                    CPInfo::ConstantClass { name_index } => Constant::Class(ClassRef::new(utf8(*name_index)?)),
                    CPInfo::ConstantFieldRef {
                        class_index,
                        name_and_type_index,
                    } => {
                        let (name, descriptor) = name_and_type(*name_and_type_index)?;
                        Constant::Field(FieldRef::new(class_name(*class_index)?, name, descriptor))
                    }
                    CPInfo::ConstantMethodRef {
                        class_index,
                        name_and_type_index,
                    } => {
                        let (name, descriptor) = name_and_type(*name_and_type_index)?;
                        Constant::Method(MethodRef::new(class_name(*class_index)?, name, descriptor))
                    }
                    CPInfo::ConstantInterfaceMethodRef {
                        class_index,
                        name_and_type_index,
                    } => {
                        let (name, descriptor) = name_and_type(*name_and_type_index)?;
                        Constant::InterfaceMethod(MethodRef::new(
                            class_name(*class_index)?,
                            name,
                            descriptor,
                        ))
                    }
                };
                Ok(constant)
            })
            .collect()
    }

    pub(crate) fn new(class: Weak<Class>, constants: Vec<Constant>) -> Self {
        Self { class, constants }
    }

    /// Class owning this pool.
    pub fn class(&self) -> Result<Rc<Class>> {
        upgrade_class(&self.class)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.len() <= 1
    }

    /// Entry at `index`. Index 0, the upper half of wide constants and
    /// folded Utf8/NameAndType entries are rejected.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.constants.get(index as usize) {
            Some(Constant::Empty) | None => Err(invalid(index, "no runtime constant at index")),
            Some(constant) => Ok(constant),
        }
    }

    pub fn class_ref(&self, index: u16) -> Result<&ClassRef> {
        match self.get(index)? {
            Constant::Class(class_ref) => Ok(class_ref),
            _ => Err(invalid(index, "expected Class")),
        }
    }

    pub fn field_ref(&self, index: u16) -> Result<&FieldRef> {
        match self.get(index)? {
            Constant::Field(field_ref) => Ok(field_ref),
            _ => Err(invalid(index, "expected Fieldref")),
        }
    }

    /// Methodref or InterfaceMethodref, with a flag telling which.
    pub fn method_ref(&self, index: u16) -> Result<(&MethodRef, bool)> {
        match self.get(index)? {
            Constant::Method(method_ref) => Ok((method_ref, false)),
            Constant::InterfaceMethod(method_ref) => Ok((method_ref, true)),
            _ => Err(invalid(index, "expected Methodref")),
        }
    }

    pub fn resolve_class(&self, index: u16) -> Result<Rc<Class>> {
        self.class_ref(index)?.resolved_class(self)
    }

    pub fn resolve_field(&self, index: u16) -> Result<Rc<Field>> {
        self.field_ref(index)?.resolved_field(self)
    }

    /// Resolve a Methodref or InterfaceMethodref entry.
    pub fn resolve_method(&self, index: u16) -> Result<Rc<Method>> {
        match self.method_ref(index)? {
            (method_ref, false) => method_ref.resolved_method(self),
            (method_ref, true) => method_ref.resolved_interface_method(self),
        }
    }
}
