//! Operand stack shuffles. They move raw slots and never look at types,
//! so the `2` forms handle one category 2 value or two category 1 values
//! alike.
use crate::bytecode::OPCode::{self, *};
use crate::error::Result;
use crate::instructions::{unexpected, Instruction};
use crate::runtime::{OperandStack, Thread};

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    if shuffle(inst.get_mnemonic(), &mut thread.current_frame()?.stack) {
        Ok(())
    } else {
        Err(unexpected(inst))
    }
}

/// Apply `op` to `stack`; false if `op` is not a stack shuffle.
fn shuffle(op: OPCode, stack: &mut OperandStack) -> bool {
    match op {
        Pop => {
            stack.pop_slot();
        }
        Pop2 => {
            stack.pop_slot();
            stack.pop_slot();
        }
        Dup => {
            let v1 = stack.peek_slot(0).clone();
            stack.push_slot(v1);
        }
        DupX1 => {
            let v1 = stack.pop_slot();
            let v2 = stack.pop_slot();
            stack.push_slot(v1.clone());
            stack.push_slot(v2);
            stack.push_slot(v1);
        }
        DupX2 => {
            let v1 = stack.pop_slot();
            let v2 = stack.pop_slot();
            let v3 = stack.pop_slot();
            stack.push_slot(v1.clone());
            stack.push_slot(v3);
            stack.push_slot(v2);
            stack.push_slot(v1);
        }
        Dup2 => {
            let v1 = stack.peek_slot(0).clone();
            let v2 = stack.peek_slot(1).clone();
            stack.push_slot(v2);
            stack.push_slot(v1);
        }
        Dup2X1 => {
            let v1 = stack.pop_slot();
            let v2 = stack.pop_slot();
            let v3 = stack.pop_slot();
            stack.push_slot(v2.clone());
            stack.push_slot(v1.clone());
            stack.push_slot(v3);
            stack.push_slot(v2);
            stack.push_slot(v1);
        }
        Dup2X2 => {
            let v1 = stack.pop_slot();
            let v2 = stack.pop_slot();
            let v3 = stack.pop_slot();
            let v4 = stack.pop_slot();
            stack.push_slot(v2.clone());
            stack.push_slot(v1.clone());
            stack.push_slot(v4);
            stack.push_slot(v3);
            stack.push_slot(v2);
            stack.push_slot(v1);
        }
        Swap => {
            let v1 = stack.pop_slot();
            let v2 = stack.pop_slot();
            stack.push_slot(v1);
            stack.push_slot(v2);
        }
        _ => return false,
    }
    true
}
