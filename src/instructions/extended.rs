//! `wide`, `multianewarray`, null branches and wide jumps.
use std::rc::Rc;

use crate::bytecode::OPCode::*;
use crate::error::{Result, VmError};
use crate::heap::{Class, ObjectData, ObjectRef};
use crate::instructions::control::jump_to_subroutine;
use crate::instructions::references::pop_count;
use crate::instructions::{unexpected, Instruction, Operands};
use crate::interpreter::Interpreter;
use crate::runtime::Thread;

pub(super) fn execute(inst: &Instruction, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
    let pc = thread.pc();
    match inst.get_mnemonic() {
        Wide => match inst.params() {
            Operands::Wide {
                opcode,
                index,
                constant,
            } => {
                let params = match constant {
                    Some(constant) => Operands::IndexConst {
                        index: *index,
                        constant: *constant,
                    },
                    None => Operands::U2(*index),
                };
                Instruction::new(*opcode, params).execute(thread, vm)
            }
            _ => Err(inst.bad_operands()),
        },
        MultiANewArray => {
            let dimensions = match inst.params() {
                Operands::MultiANewArray { dimensions, .. } => *dimensions as usize,
                _ => return Err(inst.bad_operands()),
            };
            if dimensions == 0 {
                return Err(VmError::Internal("multianewarray with zero dimensions".to_string()));
            }
            let frame = thread.current_frame()?;
            let class = frame.class().constant_pool().resolve_class(inst.cp_index()?)?;
            let mut counts = vec![0; dimensions];
            for count in counts.iter_mut().rev() {
                *count = pop_count(frame)?;
            }
            let array = new_multi_array(&class, &counts)?;
            frame.stack.push_ref(Some(array));
            Ok(())
        }
        op @ (IfNull | IfNonNull) => {
            let frame = thread.current_frame()?;
            let is_null = frame.stack.pop_ref().is_none();
            if is_null == (op == IfNull) {
                frame.branch(pc, inst.offset()?);
            }
            Ok(())
        }
        GotoW => {
            thread.current_frame()?.branch(pc, inst.offset()?);
            Ok(())
        }
        JsrW => jump_to_subroutine(thread, pc, inst.offset()?),
        _ => Err(unexpected(inst)),
    }
}

/// Allocate nested arrays, outermost dimension first. Dimensions without
/// a count are left as null elements.
fn new_multi_array(class: &Rc<Class>, counts: &[usize]) -> Result<ObjectRef> {
    let array = class.new_array(counts[0])?;
    if counts.len() > 1 {
        let component = class
            .component_class()?
            .ok_or_else(|| VmError::Internal(format!("{} has too few dimensions", class.name())))?;
        let mut data = array.data_mut();
        if let ObjectData::Refs(elements) = &mut *data {
            for element in elements.iter_mut() {
                *element = Some(new_multi_array(&component, &counts[1..])?);
            }
        }
    }
    Ok(array)
}
