//! Constants: immediate pushes and `ldc`.
use crate::bytecode::OPCode::*;
use crate::error::{ClassFormatError, Result};
use crate::heap::Constant;
use crate::instructions::{unexpected, Instruction, Operands};
use crate::runtime::Thread;

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let stack = &mut frame.stack;
    match inst.get_mnemonic() {
        NOP => {}
        AconstNull => stack.push_ref(None),
        IconstM1 => stack.push_int(-1),
        Iconst0 => stack.push_int(0),
        Iconst1 => stack.push_int(1),
        Iconst2 => stack.push_int(2),
        Iconst3 => stack.push_int(3),
        Iconst4 => stack.push_int(4),
        Iconst5 => stack.push_int(5),
        Lconst0 => stack.push_long(0),
        Lconst1 => stack.push_long(1),
        Fconst0 => stack.push_float(0.0),
        Fconst1 => stack.push_float(1.0),
        Fconst2 => stack.push_float(2.0),
        Dconst0 => stack.push_double(0.0),
        Dconst1 => stack.push_double(1.0),
        BiPush => match inst.params() {
            Operands::I1(v) => stack.push_int(*v as i32),
            _ => return Err(inst.bad_operands()),
        },
        SiPush => match inst.params() {
            Operands::I2(v) => stack.push_int(*v as i32),
            _ => return Err(inst.bad_operands()),
        },
        Ldc | LdcW | Ldc2W => {
            let index = inst.cp_index()?;
            let class = frame.class().clone();
            let pool = class.constant_pool();
            let wide = inst.get_mnemonic() == Ldc2W;
            match (pool.get(index)?, wide) {
                (Constant::Integer(v), false) => frame.stack.push_int(*v),
                (Constant::Float(v), false) => frame.stack.push_float(*v),
                (Constant::String(s), false) => {
                    let string = class.loader()?.intern_string(s)?;
                    frame.stack.push_ref(Some(string));
                }
                (Constant::Long(v), true) => frame.stack.push_long(*v),
                (Constant::Double(v), true) => frame.stack.push_double(*v),
                _ => {
                    return Err(ClassFormatError::InvalidIndex {
                        index,
                        message: format!("not loadable by {}", inst.get_mnemonic()),
                    }
                    .into())
                }
            }
        }
        _ => return Err(unexpected(inst)),
    }
    Ok(())
}
