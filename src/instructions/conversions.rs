//! Primitive conversions. Float to integer casts saturate and map NaN to
//! zero, which is exactly what Rust's `as` does.
use crate::bytecode::OPCode::*;
use crate::error::Result;
use crate::instructions::{unexpected, Instruction};
use crate::runtime::Thread;

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let stack = &mut thread.current_frame()?.stack;
    match inst.get_mnemonic() {
        I2L => {
            let v = stack.pop_int();
            stack.push_long(v as i64);
        }
        I2F => {
            let v = stack.pop_int();
            stack.push_float(v as f32);
        }
        I2D => {
            let v = stack.pop_int();
            stack.push_double(v as f64);
        }
        L2I => {
            let v = stack.pop_long();
            stack.push_int(v as i32);
        }
        L2F => {
            let v = stack.pop_long();
            stack.push_float(v as f32);
        }
        L2D => {
            let v = stack.pop_long();
            stack.push_double(v as f64);
        }
        F2I => {
            let v = stack.pop_float();
            stack.push_int(v as i32);
        }
        F2L => {
            let v = stack.pop_float();
            stack.push_long(v as i64);
        }
        F2D => {
            let v = stack.pop_float();
            stack.push_double(v as f64);
        }
        D2I => {
            let v = stack.pop_double();
            stack.push_int(v as i32);
        }
        D2L => {
            let v = stack.pop_double();
            stack.push_long(v as i64);
        }
        D2F => {
            let v = stack.pop_double();
            stack.push_float(v as f32);
        }
        I2B => {
            let v = stack.pop_int();
            stack.push_int(v as i8 as i32);
        }
        I2C => {
            let v = stack.pop_int();
            stack.push_int(v as u16 as i32);
        }
        I2S => {
            let v = stack.pop_int();
            stack.push_int(v as i16 as i32);
        }
        _ => return Err(unexpected(inst)),
    }
    Ok(())
}
