//! Arithmetic, shifts, bitwise operations and `iinc`.
//!
//! Integer arithmetic wraps around on overflow. Only integer division and
//! remainder by zero raise `ArithmeticException`; floating point follows
//! IEEE 754.
use crate::bytecode::OPCode::*;
use crate::error::{exceptions, Result, VmError};
use crate::instructions::{unexpected, Instruction, Operands};
use crate::runtime::{OperandStack, Thread};

fn divide_by_zero() -> VmError {
    VmError::exception(exceptions::ARITHMETIC_EXCEPTION, "/ by zero")
}

fn int_op(stack: &mut OperandStack, f: impl FnOnce(i32, i32) -> Result<i32>) -> Result<()> {
    let v2 = stack.pop_int();
    let v1 = stack.pop_int();
    stack.push_int(f(v1, v2)?);
    Ok(())
}

fn long_op(stack: &mut OperandStack, f: impl FnOnce(i64, i64) -> Result<i64>) -> Result<()> {
    let v2 = stack.pop_long();
    let v1 = stack.pop_long();
    stack.push_long(f(v1, v2)?);
    Ok(())
}

/// Long shifts take an `int` distance.
fn long_shift(stack: &mut OperandStack, f: impl FnOnce(i64, u32) -> i64) {
    let distance = stack.pop_int() as u32 & 0x3f;
    let value = stack.pop_long();
    stack.push_long(f(value, distance));
}

fn float_op(stack: &mut OperandStack, f: impl FnOnce(f32, f32) -> f32) {
    let v2 = stack.pop_float();
    let v1 = stack.pop_float();
    stack.push_float(f(v1, v2));
}

fn double_op(stack: &mut OperandStack, f: impl FnOnce(f64, f64) -> f64) {
    let v2 = stack.pop_double();
    let v1 = stack.pop_double();
    stack.push_double(f(v1, v2));
}

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let stack = &mut frame.stack;
    match inst.get_mnemonic() {
        IAdd => int_op(stack, |a, b| Ok(a.wrapping_add(b)))?,
        LAdd => long_op(stack, |a, b| Ok(a.wrapping_add(b)))?,
        FAdd => float_op(stack, |a, b| a + b),
        DAdd => double_op(stack, |a, b| a + b),
        ISub => int_op(stack, |a, b| Ok(a.wrapping_sub(b)))?,
        LSub => long_op(stack, |a, b| Ok(a.wrapping_sub(b)))?,
        FSub => float_op(stack, |a, b| a - b),
        DSub => double_op(stack, |a, b| a - b),
        IMul => int_op(stack, |a, b| Ok(a.wrapping_mul(b)))?,
        LMul => long_op(stack, |a, b| Ok(a.wrapping_mul(b)))?,
        FMul => float_op(stack, |a, b| a * b),
        DMul => double_op(stack, |a, b| a * b),
        // `wrapping_div` turns MIN / -1 into MIN, as Java does.
        IDiv => int_op(stack, |a, b| match b {
            0 => Err(divide_by_zero()),
            _ => Ok(a.wrapping_div(b)),
        })?,
        LDiv => long_op(stack, |a, b| match b {
            0 => Err(divide_by_zero()),
            _ => Ok(a.wrapping_div(b)),
        })?,
        FDiv => float_op(stack, |a, b| a / b),
        DDiv => double_op(stack, |a, b| a / b),
        IRem => int_op(stack, |a, b| match b {
            0 => Err(divide_by_zero()),
            _ => Ok(a.wrapping_rem(b)),
        })?,
        LRem => long_op(stack, |a, b| match b {
            0 => Err(divide_by_zero()),
            _ => Ok(a.wrapping_rem(b)),
        })?,
        // Rust's `%` truncates like Java's `frem` and `drem`.
        FRem => float_op(stack, |a, b| a % b),
        DRem => double_op(stack, |a, b| a % b),
        INeg => {
            let v = stack.pop_int();
            stack.push_int(v.wrapping_neg());
        }
        LNeg => {
            let v = stack.pop_long();
            stack.push_long(v.wrapping_neg());
        }
        FNeg => {
            let v = stack.pop_float();
            stack.push_float(-v);
        }
        DNeg => {
            let v = stack.pop_double();
            stack.push_double(-v);
        }
        IShl => int_op(stack, |a, b| Ok(a.wrapping_shl(b as u32 & 0x1f)))?,
        IShr => int_op(stack, |a, b| Ok(a.wrapping_shr(b as u32 & 0x1f)))?,
        IUShr => int_op(stack, |a, b| Ok(((a as u32) >> (b as u32 & 0x1f)) as i32))?,
        LShl => long_shift(stack, |a, s| a.wrapping_shl(s)),
        LShr => long_shift(stack, |a, s| a.wrapping_shr(s)),
        LUShr => long_shift(stack, |a, s| ((a as u64) >> s) as i64),
        IAnd => int_op(stack, |a, b| Ok(a & b))?,
        LAnd => long_op(stack, |a, b| Ok(a & b))?,
        IOr => int_op(stack, |a, b| Ok(a | b))?,
        LOr => long_op(stack, |a, b| Ok(a | b))?,
        IXor => int_op(stack, |a, b| Ok(a ^ b))?,
        LXor => long_op(stack, |a, b| Ok(a ^ b))?,
        IInc => match inst.params() {
            Operands::IndexConst { index, constant } => {
                let index = *index as usize;
                let v = frame.locals.get_int(index);
                frame.locals.set_int(index, v.wrapping_add(*constant as i32));
            }
            _ => return Err(inst.bad_operands()),
        },
        _ => return Err(unexpected(inst)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(a: i32, b: i32, f: impl FnOnce(i32, i32) -> Result<i32>) -> Result<i32> {
        let mut stack = OperandStack::new(2);
        stack.push_int(a);
        stack.push_int(b);
        int_op(&mut stack, f)?;
        Ok(stack.pop_int())
    }

    #[test]
    fn integer_edge_cases() {
        assert_eq!(binary(i32::MAX, 1, |a, b| Ok(a.wrapping_add(b))).unwrap(), i32::MIN);
        assert_eq!(binary(i32::MIN, -1, |a, b| Ok(a.wrapping_div(b))).unwrap(), i32::MIN);
        assert_eq!(binary(-7, 2, |a, b| Ok(a.wrapping_rem(b))).unwrap(), -1);
        assert_eq!(binary(7, -2, |a, b| Ok(a.wrapping_rem(b))).unwrap(), 1);
        assert_eq!(binary(1, 33, |a, b| Ok(a.wrapping_shl(b as u32 & 0x1f))).unwrap(), 2);
        assert_eq!(
            binary(-1, 28, |a, b| Ok(((a as u32) >> (b as u32 & 0x1f)) as i32)).unwrap(),
            15
        );
    }

    #[test]
    fn long_shifts_take_int_distance() {
        let mut stack = OperandStack::new(3);
        stack.push_long(-16);
        stack.push_int(66);
        long_shift(&mut stack, |a, s| a.wrapping_shr(s));
        assert_eq!(stack.pop_long(), -4);
        assert!(stack.is_empty());
    }

    #[test]
    fn float_remainder_truncates() {
        let mut stack = OperandStack::new(2);
        stack.push_float(-5.5);
        stack.push_float(2.0);
        float_op(&mut stack, |a, b| a % b);
        assert_eq!(stack.pop_float(), -1.5);
    }
}
