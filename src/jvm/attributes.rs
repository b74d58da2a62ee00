//! Attributes attached to classes, fields, methods and `Code` bodies.
//!
//! Attributes are dispatched on their name, looked up in the owning
//! constant pool. The ones the runtime cares about are decoded; all the
//! others are kept as opaque byte spans so a decoded class serializes back
//! to the same bytes.
use crate::error::ClassFormatError;
use crate::jvm::constants::CPInfo;
use crate::jvm::reader::{ClassReader, ParseResult};
use crate::jvm::writer::ClassWriter;

/// Entry of a `Code` attribute's exception handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Zero catches everything (`finally`).
    pub catch_type: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

/// Verification types used by `StackMapTable` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object { cpool_index: u16 },
    Uninitialized { offset: u16 },
}

/// `StackMapTable` frames, see JVMS §4.7.4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    SameFrame {
        frame_type: u8,
    },
    SameLocals1StackItemFrame {
        frame_type: u8,
        stack: VerificationType,
    },
    SameLocals1StackItemFrameExtended {
        offset_delta: u16,
        stack: VerificationType,
    },
    ChopFrame {
        frame_type: u8,
        offset_delta: u16,
    },
    SameFrameExtended {
        offset_delta: u16,
    },
    AppendFrame {
        frame_type: u8,
        offset_delta: u16,
        locals: Vec<VerificationType>,
    },
    FullFrame {
        offset_delta: u16,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeInfo {
    CodeAttribute {
        attribute_name_index: u16,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        exception_table: Vec<ExceptionTableEntry>,
        attributes: Vec<AttributeInfo>,
    },
    ConstantValueAttribute {
        attribute_name_index: u16,
        constant_value_index: u16,
    },
    SourceFileAttribute {
        attribute_name_index: u16,
        sourcefile_index: u16,
    },
    ExceptionsAttribute {
        attribute_name_index: u16,
        exception_index_table: Vec<u16>,
    },
    StackMapTableAttribute {
        attribute_name_index: u16,
        entries: Vec<StackMapFrame>,
    },
    LineNumberTableAttribute {
        attribute_name_index: u16,
        line_number_table: Vec<LineNumber>,
    },
    /// Any attribute the runtime does not interpret.
    Unknown {
        attribute_name_index: u16,
        info: Vec<u8>,
    },
}

impl AttributeInfo {
    /// Name of a decoded attribute, `None` for opaque ones.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            AttributeInfo::CodeAttribute { .. } => Some("Code"),
            AttributeInfo::ConstantValueAttribute { .. } => Some("ConstantValue"),
            AttributeInfo::SourceFileAttribute { .. } => Some("SourceFile"),
            AttributeInfo::ExceptionsAttribute { .. } => Some("Exceptions"),
            AttributeInfo::StackMapTableAttribute { .. } => Some("StackMapTable"),
            AttributeInfo::LineNumberTableAttribute { .. } => Some("LineNumberTable"),
            AttributeInfo::Unknown { .. } => None,
        }
    }

    pub fn attribute_name_index(&self) -> u16 {
        match self {
            AttributeInfo::CodeAttribute {
                attribute_name_index,
                ..
            }
            | AttributeInfo::ConstantValueAttribute {
                attribute_name_index,
                ..
            }
            | AttributeInfo::SourceFileAttribute {
                attribute_name_index,
                ..
            }
            | AttributeInfo::ExceptionsAttribute {
                attribute_name_index,
                ..
            }
            | AttributeInfo::StackMapTableAttribute {
                attribute_name_index,
                ..
            }
            | AttributeInfo::LineNumberTableAttribute {
                attribute_name_index,
                ..
            }
            | AttributeInfo::Unknown {
                attribute_name_index,
                ..
            } => *attribute_name_index,
        }
    }

    /// Serialize the attribute body, without the name and length header.
    fn body(&self) -> Vec<u8> {
        let mut w = ClassWriter::new();
        match self {
            AttributeInfo::CodeAttribute {
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes,
                ..
            } => {
                w.write_u16(*max_stack);
                w.write_u16(*max_locals);
                w.write_length_prefixed(code);
                w.write_u16(exception_table.len() as u16);
                for entry in exception_table {
                    w.write_u16(entry.start_pc);
                    w.write_u16(entry.end_pc);
                    w.write_u16(entry.handler_pc);
                    w.write_u16(entry.catch_type);
                }
                write_attributes(attributes, &mut w);
            }
            AttributeInfo::ConstantValueAttribute {
                constant_value_index,
                ..
            } => w.write_u16(*constant_value_index),
            AttributeInfo::SourceFileAttribute {
                sourcefile_index, ..
            } => w.write_u16(*sourcefile_index),
            AttributeInfo::ExceptionsAttribute {
                exception_index_table,
                ..
            } => {
                w.write_u16(exception_index_table.len() as u16);
                for index in exception_index_table {
                    w.write_u16(*index);
                }
            }
            AttributeInfo::StackMapTableAttribute { entries, .. } => {
                w.write_u16(entries.len() as u16);
                for frame in entries {
                    write_stack_map_frame(frame, &mut w);
                }
            }
            AttributeInfo::LineNumberTableAttribute {
                line_number_table,
                ..
            } => {
                w.write_u16(line_number_table.len() as u16);
                for line in line_number_table {
                    w.write_u16(line.start_pc);
                    w.write_u16(line.line_number);
                }
            }
            AttributeInfo::Unknown { info, .. } => w.write_bytes(info),
        }
        w.into_bytes()
    }
}

/// Find the first decoded attribute called `name`.
pub fn find_attribute<'a>(attributes: &'a [AttributeInfo], name: &str) -> Option<&'a AttributeInfo> {
    attributes.iter().find(|attr| attr.name() == Some(name))
}

pub fn parse_attributes(
    reader: &mut ClassReader,
    pool: &[CPInfo],
) -> ParseResult<Vec<AttributeInfo>> {
    reader.read_table(|r| parse_attribute(r, pool))
}

fn parse_attribute(reader: &mut ClassReader, pool: &[CPInfo]) -> ParseResult<AttributeInfo> {
    let attribute_name_index = reader.read_u16()?;
    let name = match pool.get(attribute_name_index as usize) {
        Some(CPInfo::ConstantUtf8 { value }) => value.as_str(),
        _ => {
            return Err(ClassFormatError::InvalidIndex {
                index: attribute_name_index,
                message: "attribute name must be Utf8".to_string(),
            })
        }
    };
    let info = reader.read_length_prefixed()?;
    let mut body = ClassReader::new(&info);
    let malformed = |message: &str| ClassFormatError::MalformedAttribute {
        name: name.to_string(),
        message: message.to_string(),
    };

    let attribute = match name {
        "Code" => {
            let max_stack = body.read_u16()?;
            let max_locals = body.read_u16()?;
            let code = body.read_length_prefixed()?;
            if code.is_empty() {
                return Err(malformed("empty code array"));
            }
            let exception_table = body.read_table(|r| {
                Ok(ExceptionTableEntry {
                    start_pc: r.read_u16()?,
                    end_pc: r.read_u16()?,
                    handler_pc: r.read_u16()?,
                    catch_type: r.read_u16()?,
                })
            })?;
            let attributes = parse_attributes(&mut body, pool)?;
            AttributeInfo::CodeAttribute {
                attribute_name_index,
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes,
            }
        }
        "ConstantValue" => AttributeInfo::ConstantValueAttribute {
            attribute_name_index,
            constant_value_index: body.read_u16()?,
        },
        "SourceFile" => AttributeInfo::SourceFileAttribute {
            attribute_name_index,
            sourcefile_index: body.read_u16()?,
        },
        "Exceptions" => AttributeInfo::ExceptionsAttribute {
            attribute_name_index,
            exception_index_table: body.read_table(|r| r.read_u16())?,
        },
        "StackMapTable" => AttributeInfo::StackMapTableAttribute {
            attribute_name_index,
            entries: body.read_table(parse_stack_map_frame)?,
        },
        "LineNumberTable" => AttributeInfo::LineNumberTableAttribute {
            attribute_name_index,
            line_number_table: body.read_table(|r| {
                Ok(LineNumber {
                    start_pc: r.read_u16()?,
                    line_number: r.read_u16()?,
                })
            })?,
        },
        _ => {
            return Ok(AttributeInfo::Unknown {
                attribute_name_index,
                info,
            })
        }
    };

    if body.remaining() != 0 {
        return Err(malformed("length does not match contents"));
    }
    Ok(attribute)
}

pub(crate) fn write_attributes(attributes: &[AttributeInfo], w: &mut ClassWriter) {
    w.write_u16(attributes.len() as u16);
    for attribute in attributes {
        w.write_u16(attribute.attribute_name_index());
        w.write_length_prefixed(&attribute.body());
    }
}

fn parse_verification_type(reader: &mut ClassReader) -> ParseResult<VerificationType> {
    let tag = reader.read_u8()?;
    let ty = match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object {
            cpool_index: reader.read_u16()?,
        },
        8 => VerificationType::Uninitialized {
            offset: reader.read_u16()?,
        },
        _ => {
            return Err(ClassFormatError::MalformedAttribute {
                name: "StackMapTable".to_string(),
                message: format!("unknown verification type {tag}"),
            })
        }
    };
    Ok(ty)
}

fn write_verification_type(ty: &VerificationType, w: &mut ClassWriter) {
    match ty {
        VerificationType::Top => w.write_u8(0),
        VerificationType::Integer => w.write_u8(1),
        VerificationType::Float => w.write_u8(2),
        VerificationType::Double => w.write_u8(3),
        VerificationType::Long => w.write_u8(4),
        VerificationType::Null => w.write_u8(5),
        VerificationType::UninitializedThis => w.write_u8(6),
        VerificationType::Object { cpool_index } => {
            w.write_u8(7);
            w.write_u16(*cpool_index);
        }
        VerificationType::Uninitialized { offset } => {
            w.write_u8(8);
            w.write_u16(*offset);
        }
    }
}

fn parse_stack_map_frame(reader: &mut ClassReader) -> ParseResult<StackMapFrame> {
    let frame_type = reader.read_u8()?;
    let frame = match frame_type {
        0..=63 => StackMapFrame::SameFrame { frame_type },
        64..=127 => StackMapFrame::SameLocals1StackItemFrame {
            frame_type,
            stack: parse_verification_type(reader)?,
        },
        247 => StackMapFrame::SameLocals1StackItemFrameExtended {
            offset_delta: reader.read_u16()?,
            stack: parse_verification_type(reader)?,
        },
        248..=250 => StackMapFrame::ChopFrame {
            frame_type,
            offset_delta: reader.read_u16()?,
        },
        251 => StackMapFrame::SameFrameExtended {
            offset_delta: reader.read_u16()?,
        },
        252..=254 => {
            let offset_delta = reader.read_u16()?;
            let mut locals = Vec::new();
            for _ in 0..(frame_type - 251) {
                locals.push(parse_verification_type(reader)?);
            }
            StackMapFrame::AppendFrame {
                frame_type,
                offset_delta,
                locals,
            }
        }
        255 => StackMapFrame::FullFrame {
            offset_delta: reader.read_u16()?,
            locals: reader.read_table(parse_verification_type)?,
            stack: reader.read_table(parse_verification_type)?,
        },
        _ => {
            return Err(ClassFormatError::MalformedAttribute {
                name: "StackMapTable".to_string(),
                message: format!("reserved frame type {frame_type}"),
            })
        }
    };
    Ok(frame)
}

fn write_stack_map_frame(frame: &StackMapFrame, w: &mut ClassWriter) {
    match frame {
        StackMapFrame::SameFrame { frame_type } => w.write_u8(*frame_type),
        StackMapFrame::SameLocals1StackItemFrame { frame_type, stack } => {
            w.write_u8(*frame_type);
            write_verification_type(stack, w);
        }
        StackMapFrame::SameLocals1StackItemFrameExtended {
            offset_delta,
            stack,
        } => {
            w.write_u8(247);
            w.write_u16(*offset_delta);
            write_verification_type(stack, w);
        }
        StackMapFrame::ChopFrame {
            frame_type,
            offset_delta,
        } => {
            w.write_u8(*frame_type);
            w.write_u16(*offset_delta);
        }
        StackMapFrame::SameFrameExtended { offset_delta } => {
            w.write_u8(251);
            w.write_u16(*offset_delta);
        }
        StackMapFrame::AppendFrame {
            frame_type,
            offset_delta,
            locals,
        } => {
            w.write_u8(*frame_type);
            w.write_u16(*offset_delta);
            for ty in locals {
                write_verification_type(ty, w);
            }
        }
        StackMapFrame::FullFrame {
            offset_delta,
            locals,
            stack,
        } => {
            w.write_u8(255);
            w.write_u16(*offset_delta);
            w.write_u16(locals.len() as u16);
            for ty in locals {
                write_verification_type(ty, w);
            }
            w.write_u16(stack.len() as u16);
            for ty in stack {
                write_verification_type(ty, w);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::constants::JavaStr;

    fn pool() -> Vec<CPInfo> {
        ["Code", "StackMapTable", "Signature", "LineNumberTable"]
            .iter()
            .fold(vec![CPInfo::Unusable], |mut pool, name| {
                pool.push(CPInfo::ConstantUtf8 {
                    value: JavaStr::from(*name),
                });
                pool
            })
    }

    fn round_trip(attributes: Vec<AttributeInfo>) -> Vec<AttributeInfo> {
        let mut w = ClassWriter::new();
        write_attributes(&attributes, &mut w);
        let bytes = w.into_bytes();
        let mut reader = ClassReader::new(&bytes);
        let decoded = parse_attributes(&mut reader, &pool()).unwrap();
        assert_eq!(reader.remaining(), 0);
        decoded
    }

    #[test]
    fn code_with_nested_attributes_round_trips() {
        let code = AttributeInfo::CodeAttribute {
            attribute_name_index: 1,
            max_stack: 2,
            max_locals: 1,
            code: vec![0x04, 0x3B, 0xB1],
            exception_table: vec![ExceptionTableEntry {
                start_pc: 0,
                end_pc: 2,
                handler_pc: 2,
                catch_type: 0,
            }],
            attributes: vec![
                AttributeInfo::StackMapTableAttribute {
                    attribute_name_index: 2,
                    entries: vec![
                        StackMapFrame::SameFrame { frame_type: 3 },
                        StackMapFrame::AppendFrame {
                            frame_type: 253,
                            offset_delta: 4,
                            locals: vec![VerificationType::Integer, VerificationType::Long],
                        },
                        StackMapFrame::FullFrame {
                            offset_delta: 9,
                            locals: vec![VerificationType::Object { cpool_index: 1 }],
                            stack: vec![VerificationType::Uninitialized { offset: 3 }],
                        },
                    ],
                },
                AttributeInfo::LineNumberTableAttribute {
                    attribute_name_index: 4,
                    line_number_table: vec![LineNumber {
                        start_pc: 0,
                        line_number: 7,
                    }],
                },
            ],
        };
        assert_eq!(round_trip(vec![code.clone()]), vec![code]);
    }

    #[test]
    fn unknown_attributes_are_opaque() {
        let unknown = AttributeInfo::Unknown {
            attribute_name_index: 3,
            info: vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00],
        };
        assert_eq!(round_trip(vec![unknown.clone()]), vec![unknown]);
    }

    #[test]
    fn length_mismatch_is_malformed() {
        // Code attribute with one stray byte after its nested attributes.
        let mut w = ClassWriter::new();
        w.write_u16(1);
        w.write_u16(1);
        w.write_u32(14);
        w.write_u16(1);
        w.write_u16(0);
        w.write_u32(1);
        w.write_u8(0xB1);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u8(0xFF);
        let bytes = w.into_bytes();
        let result = parse_attributes(&mut ClassReader::new(&bytes), &pool());
        assert!(matches!(
            result,
            Err(ClassFormatError::MalformedAttribute { .. })
        ));
    }

    #[test]
    fn name_must_be_utf8() {
        let mut w = ClassWriter::new();
        w.write_u16(1);
        w.write_u16(9);
        w.write_u32(0);
        let bytes = w.into_bytes();
        assert!(parse_attributes(&mut ClassReader::new(&bytes), &pool()).is_err());
    }
}
