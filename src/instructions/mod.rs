//! The instruction set.
//!
//! Instructions are composed of an opcode and its operands. Decoding reads
//! the opcode byte, then the operands whose shape the opcode determines.
//! Execution is dispatched to one module per instruction group.
mod comparisons;
mod constants;
mod control;
mod conversions;
mod extended;
mod invoke;
mod loads;
mod math;
mod references;
mod stack;
mod stores;

use std::rc::Rc;

use tracing::debug;

use crate::bytecode::{BytecodeReader, OPCode};
use crate::error::{exceptions, Result, VmError};
use crate::heap::{Class, ObjectRef};
use crate::interpreter::Interpreter;
use crate::runtime::{Frame, Thread};

/// Operands of an instruction, by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    None,
    /// Signed byte, `bipush`.
    I1(i8),
    /// Signed short, `sipush` and branch offsets.
    I2(i16),
    /// Signed int, `goto_w` and `jsr_w` offsets.
    I4(i32),
    /// Unsigned byte: `ldc` index, local variable index or `newarray` type.
    U1(u8),
    /// Unsigned short: constant pool index, or a local variable index
    /// under `wide`.
    U2(u16),
    /// Local variable index and increment of `iinc`.
    IndexConst { index: u16, constant: i16 },
    /// Element type code of `newarray`.
    ArrayType(u8),
    TableSwitch {
        default: i32,
        low: i32,
        high: i32,
        offsets: Vec<i32>,
    },
    LookupSwitch {
        default: i32,
        pairs: Vec<(i32, i32)>,
    },
    InvokeInterface { index: u16, count: u8 },
    MultiANewArray { index: u16, dimensions: u8 },
    /// A load, store, `ret` or `iinc` widened by the `wide` prefix.
    Wide {
        opcode: OPCode,
        index: u16,
        constant: Option<i16>,
    },
}

impl Operands {
    /// Local variable index of loads, stores, `ret` and `iinc`.
    pub fn local_index(&self) -> Option<usize> {
        match self {
            Operands::U1(index) => Some(*index as usize),
            Operands::U2(index) => Some(*index as usize),
            Operands::IndexConst { index, .. } => Some(*index as usize),
            _ => None,
        }
    }

    /// Constant pool index carried by the operands.
    pub fn cp_index(&self) -> Option<u16> {
        match self {
            Operands::U1(index) => Some(*index as u16),
            Operands::U2(index) => Some(*index),
            Operands::InvokeInterface { index, .. } | Operands::MultiANewArray { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Branch offset of jumps.
    pub fn offset(&self) -> Option<i32> {
        match self {
            Operands::I2(offset) => Some(*offset as i32),
            Operands::I4(offset) => Some(*offset),
            _ => None,
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    mnemonic: OPCode,
    params: Operands,
}

impl Instruction {
    pub fn new(mnemonic: OPCode, params: Operands) -> Self {
        Self { mnemonic, params }
    }

    pub fn get_mnemonic(&self) -> OPCode {
        self.mnemonic
    }

    /// Opcode byte, for diagnostics.
    pub fn opcode(&self) -> u8 {
        self.mnemonic.as_u8()
    }

    pub fn params(&self) -> &Operands {
        &self.params
    }

    /// Decode the instruction at the reader's position and leave the
    /// reader right after its last operand.
    pub fn decode(reader: &mut BytecodeReader) -> Result<Instruction> {
        let pc = reader.pc();
        let byte = reader.read_u1()?;
        let mnemonic =
            OPCode::from_u8(byte).ok_or(VmError::UnknownOpcode { opcode: byte, pc })?;
        let params = Self::fetch_operands(mnemonic, reader)?;
        Ok(Instruction { mnemonic, params })
    }

    /// Read the operands of `mnemonic`. The reader must be positioned
    /// immediately after the opcode byte.
    pub fn fetch_operands(mnemonic: OPCode, reader: &mut BytecodeReader) -> Result<Operands> {
        use OPCode::*;
        let operands = match mnemonic {
            BiPush => Operands::I1(reader.read_i1()?),
            SiPush => Operands::I2(reader.read_i2()?),
            Ldc | ILoad | LLoad | FLoad | DLoad | ALoad | IStore | LStore | FStore | DStore
            | AStore | Ret => Operands::U1(reader.read_u1()?),
            NewArray => Operands::ArrayType(reader.read_u1()?),
            LdcW | Ldc2W | GetStatic | PutStatic | GetField | PutField | InvokeVirtual
            | InvokeSpecial | InvokeStatic | New | ANewArray | CheckCast | InstanceOf => {
                Operands::U2(reader.read_u2()?)
            }
            IInc => Operands::IndexConst {
                index: reader.read_u1()? as u16,
                constant: reader.read_i1()? as i16,
            },
            IfEq | IfNe | IfLt | IfGe | IfGt | IfLe | IfICmpEq | IfICmpNe | IfICmpLt
            | IfICmpGe | IfICmpGt | IfICmpLe | IfACmpEq | IfACmpNe | Goto | Jsr | IfNull
            | IfNonNull => Operands::I2(reader.read_i2()?),
            GotoW | JsrW => Operands::I4(reader.read_i4()?),
            TableSwitch => {
                reader.skip_padding();
                let default = reader.read_i4()?;
                let low = reader.read_i4()?;
                let high = reader.read_i4()?;
                if high < low {
                    return Err(VmError::Internal(format!(
                        "tableswitch with low {low} above high {high}"
                    )));
                }
                let offsets = reader.read_i4s((high as i64 - low as i64 + 1) as usize)?;
                Operands::TableSwitch {
                    default,
                    low,
                    high,
                    offsets,
                }
            }
            LookupSwitch => {
                reader.skip_padding();
                let default = reader.read_i4()?;
                let npairs = reader.read_i4()?;
                let pairs = reader
                    .read_i4s(npairs.max(0) as usize * 2)?
                    .chunks(2)
                    .map(|pair| (pair[0], pair[1]))
                    .collect();
                Operands::LookupSwitch { default, pairs }
            }
            InvokeInterface | InvokeDynamic => {
                let index = reader.read_u2()?;
                let count = reader.read_u1()?;
                // Trailing zero byte.
                reader.read_u1()?;
                Operands::InvokeInterface { index, count }
            }
            MultiANewArray => Operands::MultiANewArray {
                index: reader.read_u2()?,
                dimensions: reader.read_u1()?,
            },
            Wide => {
                let pc = reader.pc();
                let byte = reader.read_u1()?;
                let opcode = match OPCode::from_u8(byte) {
                    Some(
                        op @ (ILoad | LLoad | FLoad | DLoad | ALoad | IStore | LStore | FStore
                        | DStore | AStore | Ret | IInc),
                    ) => op,
                    _ => return Err(VmError::UnknownOpcode { opcode: byte, pc }),
                };
                let index = reader.read_u2()?;
                let constant = match opcode {
                    IInc => Some(reader.read_i2()?),
                    _ => None,
                };
                Operands::Wide {
                    opcode,
                    index,
                    constant,
                }
            }
            _ => Operands::None,
        };
        Ok(operands)
    }

    /// Run the instruction on the thread's current frame.
    pub fn execute(&self, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
        match self.opcode() {
            0x00..=0x14 => constants::execute(self, thread),
            0x15..=0x35 => loads::execute(self, thread),
            0x36..=0x56 => stores::execute(self, thread),
            0x57..=0x5f => stack::execute(self, thread),
            0x60..=0x84 => math::execute(self, thread),
            0x85..=0x93 => conversions::execute(self, thread),
            0x94..=0xa6 => comparisons::execute(self, thread),
            0xa7..=0xb1 => control::execute(self, thread),
            0xb6..=0xba => invoke::execute(self, thread, vm),
            0xb2..=0xc3 => references::execute(self, thread),
            _ => extended::execute(self, thread, vm),
        }
    }

    fn cp_index(&self) -> Result<u16> {
        self.params.cp_index().ok_or_else(|| self.bad_operands())
    }

    fn local_index(&self) -> Result<usize> {
        self.params.local_index().ok_or_else(|| self.bad_operands())
    }

    fn offset(&self) -> Result<i32> {
        self.params.offset().ok_or_else(|| self.bad_operands())
    }

    fn bad_operands(&self) -> VmError {
        VmError::Internal(format!("{} has operands {:?}", self.mnemonic, self.params))
    }
}

/// Error for an instruction executed outside of the group handling it.
fn unexpected(inst: &Instruction) -> VmError {
    VmError::Internal(format!("{} dispatched to the wrong group", inst.mnemonic))
}

fn null_pointer(what: &str) -> VmError {
    VmError::exception(exceptions::NULL_POINTER_EXCEPTION, what)
}

/// Pop a reference, failing with `NullPointerException` on `null`.
fn pop_non_null(frame: &mut Frame, what: &str) -> Result<ObjectRef> {
    frame.stack.pop_ref().ok_or_else(|| null_pointer(what))
}

/// Make the current instruction wait for `class` to be initialized.
///
/// Returns `true` when initialization frames were scheduled; the caller
/// must then return without executing. The instruction runs again once
/// every `<clinit>` has returned.
pub(crate) fn defer_to_initialization(thread: &mut Thread, class: &Rc<Class>) -> Result<bool> {
    if class.init_started() {
        return Ok(false);
    }
    thread.revert_next_pc()?;
    init_class(thread, class)?;
    Ok(true)
}

/// Mark `class` as initializing and push its `<clinit>`, then do the same
/// for uninitialized super classes. Frames pushed later run first, so the
/// super classes are initialized before `class`.
pub fn init_class(thread: &mut Thread, class: &Rc<Class>) -> Result<()> {
    class.start_init();
    if let Some(clinit) = class.clinit() {
        debug!(class = class.name(), "scheduling <clinit>");
        thread.push_frame(Frame::new(clinit)?)?;
    }
    if !class.is_interface() {
        if let Some(super_class) = class.super_class() {
            if !super_class.init_started() {
                init_class(thread, &super_class)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(code: &[u8]) -> (Instruction, usize) {
        let mut reader = BytecodeReader::new(code, 0);
        let inst = Instruction::decode(&mut reader).unwrap();
        (inst, reader.pc())
    }

    #[test]
    fn operand_shapes() {
        assert_eq!(
            decode(&[0x10, 0xf6]),
            (Instruction::new(OPCode::BiPush, Operands::I1(-10)), 2)
        );
        assert_eq!(
            decode(&[0x11, 0x01, 0x00]),
            (Instruction::new(OPCode::SiPush, Operands::I2(256)), 3)
        );
        assert_eq!(
            decode(&[0x84, 0x01, 0xff]),
            (
                Instruction::new(OPCode::IInc, Operands::IndexConst { index: 1, constant: -1 }),
                3
            )
        );
        assert_eq!(
            decode(&[0xa7, 0xff, 0xf4]),
            (Instruction::new(OPCode::Goto, Operands::I2(-12)), 3)
        );
        assert_eq!(
            decode(&[0xb9, 0x00, 0x07, 0x02, 0x00]),
            (
                Instruction::new(OPCode::InvokeInterface, Operands::InvokeInterface { index: 7, count: 2 }),
                5
            )
        );
        assert_eq!(decode(&[0x60]), (Instruction::new(OPCode::IAdd, Operands::None), 1));
    }

    #[test]
    fn wide_operands() {
        assert_eq!(
            decode(&[0xc4, 0x15, 0x01, 0x00]),
            (
                Instruction::new(
                    OPCode::Wide,
                    Operands::Wide { opcode: OPCode::ILoad, index: 256, constant: None }
                ),
                4
            )
        );
        assert_eq!(
            decode(&[0xc4, 0x84, 0x00, 0x02, 0x80, 0x00]),
            (
                Instruction::new(
                    OPCode::Wide,
                    Operands::Wide { opcode: OPCode::IInc, index: 2, constant: Some(i16::MIN) }
                ),
                6
            )
        );
        let mut reader = BytecodeReader::new(&[0xc4, 0x60], 0);
        assert!(matches!(
            Instruction::decode(&mut reader),
            Err(VmError::UnknownOpcode { opcode: 0x60, pc: 1 })
        ));
    }

    #[test]
    fn switch_operands_are_aligned() {
        // tableswitch at pc 1: two padding bytes, then default, low, high.
        let mut code = vec![0x00, 0xaa, 0x00, 0x00];
        for v in [20i32, 1, 2, 8, 12] {
            code.extend_from_slice(&v.to_be_bytes());
        }
        let mut reader = BytecodeReader::new(&code, 1);
        let inst = Instruction::decode(&mut reader).unwrap();
        assert_eq!(
            inst.params(),
            &Operands::TableSwitch { default: 20, low: 1, high: 2, offsets: vec![8, 12] }
        );
        assert_eq!(reader.pc(), code.len());

        let mut code = vec![0xab, 0x00, 0x00, 0x00];
        for v in [9i32, 1, 5, 30] {
            code.extend_from_slice(&v.to_be_bytes());
        }
        let (inst, len) = decode(&code);
        assert_eq!(inst.params(), &Operands::LookupSwitch { default: 9, pairs: vec![(5, 30)] });
        assert_eq!(len, code.len());
    }

    #[test]
    fn unknown_opcode() {
        let mut reader = BytecodeReader::new(&[0x00, 0xcb], 1);
        assert!(matches!(
            Instruction::decode(&mut reader),
            Err(VmError::UnknownOpcode { opcode: 0xcb, pc: 1 })
        ));
    }
}
