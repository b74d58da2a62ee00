//! Jumps, subroutines, switches and method returns.
use crate::bytecode::OPCode::*;
use crate::error::Result;
use crate::instructions::{unexpected, Instruction, Operands};
use crate::runtime::{Frame, Slot, Thread, Value};

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let pc = thread.pc();
    match inst.get_mnemonic() {
        Goto => thread.current_frame()?.branch(pc, inst.offset()?),
        Jsr => jump_to_subroutine(thread, pc, inst.offset()?)?,
        Ret => {
            let frame = thread.current_frame()?;
            frame.next_pc = frame.locals.get_int(inst.local_index()?) as usize;
        }
        TableSwitch => {
            let frame = thread.current_frame()?;
            let offset = match inst.params() {
                Operands::TableSwitch {
                    default,
                    low,
                    high,
                    offsets,
                } => {
                    let index = frame.stack.pop_int();
                    if index < *low || index > *high {
                        *default
                    } else {
                        offsets[(index as i64 - *low as i64) as usize]
                    }
                }
                _ => return Err(inst.bad_operands()),
            };
            frame.branch(pc, offset);
        }
        LookupSwitch => {
            let frame = thread.current_frame()?;
            let offset = match inst.params() {
                Operands::LookupSwitch { default, pairs } => {
                    let key = frame.stack.pop_int();
                    pairs
                        .iter()
                        .find(|(k, _)| *k == key)
                        .map_or(*default, |(_, offset)| *offset)
                }
                _ => return Err(inst.bad_operands()),
            };
            frame.branch(pc, offset);
        }
        IReturn => return_value(thread, |frame| Value::Int(frame.stack.pop_int()))?,
        LReturn => return_value(thread, |frame| Value::Long(frame.stack.pop_long()))?,
        FReturn => return_value(thread, |frame| Value::Float(frame.stack.pop_float()))?,
        DReturn => return_value(thread, |frame| Value::Double(frame.stack.pop_double()))?,
        AReturn => return_value(thread, |frame| Value::Reference(frame.stack.pop_ref()))?,
        Return => {
            thread.pop_frame()?;
        }
        _ => return Err(unexpected(inst)),
    }
    Ok(())
}

/// Push the return address, the instruction after the jump, and branch.
pub(super) fn jump_to_subroutine(thread: &mut Thread, pc: usize, offset: i32) -> Result<()> {
    let frame = thread.current_frame()?;
    let return_address = frame.next_pc as i32;
    frame.stack.push_slot(Slot::Num(return_address));
    frame.branch(pc, offset);
    Ok(())
}

/// Pop the current frame and hand its result to the caller. A value
/// returned by the bottom frame is kept on the thread.
fn return_value(
    thread: &mut Thread,
    pop: impl FnOnce(&mut Frame) -> Value,
) -> Result<()> {
    let mut frame = thread.pop_frame()?;
    let value = pop(&mut frame);
    if thread.is_stack_empty() {
        thread.set_return_value(Some(value));
    } else {
        thread.current_frame()?.stack.push_value(&value);
    }
    Ok(())
}
