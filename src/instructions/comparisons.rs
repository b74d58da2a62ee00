//! Comparisons and conditional branches. Branch offsets are relative to
//! the start of the branching instruction.
use std::cmp::Ordering;
use std::rc::Rc;

use crate::bytecode::OPCode::*;
use crate::error::Result;
use crate::instructions::{unexpected, Instruction};
use crate::runtime::Thread;

/// `fcmpl`/`dcmpl` push -1 on NaN, `fcmpg`/`dcmpg` push 1.
fn compare<T: PartialOrd>(v1: T, v2: T, nan: i32) -> i32 {
    match v1.partial_cmp(&v2) {
        Some(Ordering::Greater) => 1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Less) => -1,
        None => nan,
    }
}

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let pc = thread.pc();
    let frame = thread.current_frame()?;
    let stack = &mut frame.stack;
    let taken = match inst.get_mnemonic() {
        LCmp => {
            let v2 = stack.pop_long();
            let v1 = stack.pop_long();
            stack.push_int(v1.cmp(&v2) as i32);
            return Ok(());
        }
        op @ (FCmpL | FCmpG) => {
            let v2 = stack.pop_float();
            let v1 = stack.pop_float();
            stack.push_int(compare(v1, v2, if op == FCmpG { 1 } else { -1 }));
            return Ok(());
        }
        op @ (DCmpL | DCmpG) => {
            let v2 = stack.pop_double();
            let v1 = stack.pop_double();
            stack.push_int(compare(v1, v2, if op == DCmpG { 1 } else { -1 }));
            return Ok(());
        }
        IfEq => stack.pop_int() == 0,
        IfNe => stack.pop_int() != 0,
        IfLt => stack.pop_int() < 0,
        IfGe => stack.pop_int() >= 0,
        IfGt => stack.pop_int() > 0,
        IfLe => stack.pop_int() <= 0,
        op @ (IfICmpEq | IfICmpNe | IfICmpLt | IfICmpGe | IfICmpGt | IfICmpLe) => {
            let v2 = stack.pop_int();
            let v1 = stack.pop_int();
            match op {
                IfICmpEq => v1 == v2,
                IfICmpNe => v1 != v2,
                IfICmpLt => v1 < v2,
                IfICmpGe => v1 >= v2,
                IfICmpGt => v1 > v2,
                _ => v1 <= v2,
            }
        }
        op @ (IfACmpEq | IfACmpNe) => {
            let v2 = stack.pop_ref();
            let v1 = stack.pop_ref();
            let same = match (&v1, &v2) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            same == (op == IfACmpEq)
        }
        _ => return Err(unexpected(inst)),
    };
    if taken {
        frame.branch(pc, inst.offset()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_comparisons() {
        assert_eq!(compare(f32::NAN, 1.0, -1), -1);
        assert_eq!(compare(f32::NAN, 1.0, 1), 1);
        assert_eq!(compare(1.0f64, 1.0, 1), 0);
        assert_eq!(compare(-0.0f64, 0.0, 1), 0);
        assert_eq!(compare(2.0f32, 1.0, -1), 1);
    }
}
