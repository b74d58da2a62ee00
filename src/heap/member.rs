//! Runtime fields and methods.
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::descriptor::MethodDescriptor;
use crate::error::{ClassFormatError, Result, VmError};
use crate::heap::Class;
use crate::jvm::{AccessFlags, AttributeInfo, JVMClassFile, LineNumber, MemberInfo};

pub(crate) fn upgrade_class(class: &Weak<Class>) -> Result<Rc<Class>> {
    class
        .upgrade()
        .ok_or_else(|| VmError::Internal("member outlived its class".to_string()))
}

fn member_strings(class_file: &JVMClassFile, info: &MemberInfo) -> Result<(String, String)> {
    let lookup = |index: u16| -> Result<String> {
        class_file
            .utf8(index)
            .map(str::to_string)
            .ok_or_else(|| {
                ClassFormatError::InvalidIndex {
                    index,
                    message: "expected Utf8".to_string(),
                }
                .into()
            })
    };
    Ok((lookup(info.name_index())?, lookup(info.descriptor_index())?))
}

/// Field data extracted from the class file before the runtime class exists.
#[derive(Debug, Clone)]
pub(crate) struct FieldParts {
    access_flags: AccessFlags,
    name: String,
    descriptor: String,
    constant_value_index: Option<u16>,
}

impl FieldParts {
    pub(crate) fn new(class_file: &JVMClassFile, info: &MemberInfo) -> Result<Self> {
        let (name, descriptor) = member_strings(class_file, info)?;
        let constant_value_index = match info.get("ConstantValue") {
            Some(AttributeInfo::ConstantValueAttribute {
                constant_value_index,
                ..
            }) => Some(*constant_value_index),
            _ => None,
        };
        Ok(Self {
            access_flags: info.access_flags(),
            name,
            descriptor,
            constant_value_index,
        })
    }
}

pub struct Field {
    access_flags: AccessFlags,
    name: String,
    descriptor: String,
    class: Weak<Class>,
    /// Index into the instance or static slot array, assigned at link.
    slot_id: Cell<usize>,
    constant_value_index: Option<u16>,
}

impl Field {
    pub(crate) fn new(parts: FieldParts, class: Weak<Class>) -> Self {
        Self {
            access_flags: parts.access_flags,
            name: parts.name,
            descriptor: parts.descriptor,
            class,
            slot_id: Cell::new(0),
            constant_value_index: parts.constant_value_index,
        }
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn class(&self) -> Result<Rc<Class>> {
        upgrade_class(&self.class)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(AccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(AccessFlags::FINAL)
    }

    /// `long` and `double` fields take two slots.
    pub fn is_wide(&self) -> bool {
        matches!(self.descriptor.as_bytes().first(), Some(b'J' | b'D'))
    }

    pub fn slot_id(&self) -> usize {
        self.slot_id.get()
    }

    pub(crate) fn set_slot_id(&self, slot_id: usize) {
        self.slot_id.set(slot_id);
    }

    pub fn constant_value_index(&self) -> Option<u16> {
        self.constant_value_index
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Field({}:{} @{})", self.name, self.descriptor, self.slot_id())
    }
}

/// Entry of a method's exception handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: usize,
    pub end_pc: usize,
    pub handler_pc: usize,
    /// Constant pool index of the caught class, `None` catches everything.
    pub catch_type: Option<u16>,
}

impl ExceptionHandler {
    pub fn covers(&self, pc: usize) -> bool {
        self.start_pc <= pc && pc < self.end_pc
    }
}

/// Method data extracted from the class file before the runtime class exists.
#[derive(Debug, Clone)]
pub(crate) struct MethodParts {
    access_flags: AccessFlags,
    name: String,
    descriptor: String,
    parsed: MethodDescriptor,
    max_stack: usize,
    max_locals: usize,
    code: Vec<u8>,
    exception_table: Vec<ExceptionHandler>,
    line_numbers: Vec<LineNumber>,
}

impl MethodParts {
    pub(crate) fn new(class_file: &JVMClassFile, info: &MemberInfo) -> Result<Self> {
        let (name, descriptor) = member_strings(class_file, info)?;
        let parsed = MethodDescriptor::parse(&descriptor).ok_or_else(|| {
            VmError::from(ClassFormatError::InvalidIndex {
                index: info.descriptor_index(),
                message: format!("malformed method descriptor {descriptor}"),
            })
        })?;
        let mut parts = Self {
            access_flags: info.access_flags(),
            name,
            descriptor,
            parsed,
            max_stack: 0,
            max_locals: 0,
            code: Vec::new(),
            exception_table: Vec::new(),
            line_numbers: Vec::new(),
        };
        if let Some(AttributeInfo::CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
            ..
        }) = info.get("Code")
        {
            parts.max_stack = *max_stack as usize;
            parts.max_locals = *max_locals as usize;
            parts.code = code.clone();
            parts.exception_table = exception_table
                .iter()
                .map(|entry| ExceptionHandler {
                    start_pc: entry.start_pc as usize,
                    end_pc: entry.end_pc as usize,
                    handler_pc: entry.handler_pc as usize,
                    catch_type: (entry.catch_type != 0).then_some(entry.catch_type),
                })
                .collect();
            if let Some(AttributeInfo::LineNumberTableAttribute {
                line_number_table, ..
            }) = crate::jvm::find_attribute(attributes, "LineNumberTable")
            {
                parts.line_numbers = line_number_table.clone();
            }
        } else if !parts
            .access_flags
            .intersects(AccessFlags::NATIVE | AccessFlags::ABSTRACT)
        {
            return Err(ClassFormatError::MalformedAttribute {
                name: "Code".to_string(),
                message: format!("method {} has no code", parts.name),
            }
            .into());
        }
        Ok(parts)
    }
}

pub struct Method {
    access_flags: AccessFlags,
    name: String,
    descriptor: String,
    parsed: MethodDescriptor,
    class: Weak<Class>,
    max_stack: usize,
    max_locals: usize,
    code: Vec<u8>,
    /// Slots taken by the arguments, `this` included for instance methods.
    arg_slot_count: usize,
    exception_table: Vec<ExceptionHandler>,
    line_numbers: Vec<LineNumber>,
}

impl Method {
    pub(crate) fn new(parts: MethodParts, class: Weak<Class>) -> Self {
        let mut arg_slot_count = parts.parsed.arg_slot_count();
        if !parts.access_flags.contains(AccessFlags::STATIC) {
            arg_slot_count += 1;
        }
        Self {
            access_flags: parts.access_flags,
            name: parts.name,
            descriptor: parts.descriptor,
            parsed: parts.parsed,
            class,
            // Natives get a frame big enough to hold their arguments.
            max_stack: parts.max_stack,
            max_locals: parts.max_locals.max(arg_slot_count),
            code: parts.code,
            arg_slot_count,
            exception_table: parts.exception_table,
            line_numbers: parts.line_numbers,
        }
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn parsed_descriptor(&self) -> &MethodDescriptor {
        &self.parsed
    }

    pub fn class(&self) -> Result<Rc<Class>> {
        upgrade_class(&self.class)
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn arg_slot_count(&self) -> usize {
        self.arg_slot_count
    }

    pub fn exception_table(&self) -> &[ExceptionHandler] {
        &self.exception_table
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(AccessFlags::STATIC)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(AccessFlags::NATIVE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(AccessFlags::ABSTRACT)
    }

    pub fn is_private(&self) -> bool {
        self.access_flags.contains(AccessFlags::PRIVATE)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Source line of the instruction at `pc`, when the class carries
    /// line numbers.
    pub fn line_number(&self, pc: usize) -> Option<u16> {
        self.line_numbers
            .iter()
            .filter(|entry| entry.start_pc as usize <= pc)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line_number)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let class = self
            .class
            .upgrade()
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        write!(f, "{}.{}{}", class, self.name, self.descriptor)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Method({self})")
    }
}
