//! Loads from local variables and arrays.
use crate::bytecode::OPCode::{self, *};
use crate::error::{exceptions, Result, VmError};
use crate::heap::ObjectData;
use crate::instructions::{pop_non_null, unexpected, Instruction};
use crate::runtime::{Frame, Thread};

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let op = inst.get_mnemonic();
    match op {
        ILoad | FLoad | ALoad => load_one(frame, inst.local_index()?),
        LLoad | DLoad => load_two(frame, inst.local_index()?),
        ILoad0 | FLoad0 | ALoad0 => load_one(frame, 0),
        ILoad1 | FLoad1 | ALoad1 => load_one(frame, 1),
        ILoad2 | FLoad2 | ALoad2 => load_one(frame, 2),
        ILoad3 | FLoad3 | ALoad3 => load_one(frame, 3),
        LLoad0 | DLoad0 => load_two(frame, 0),
        LLoad1 | DLoad1 => load_two(frame, 1),
        LLoad2 | DLoad2 => load_two(frame, 2),
        LLoad3 | DLoad3 => load_two(frame, 3),
        IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
            return array_load(frame, op)
        }
        _ => return Err(unexpected(inst)),
    }
    Ok(())
}

// Locals are copied slot by slot, so the same code serves every type of
// the same width.
fn load_one(frame: &mut Frame, index: usize) {
    let slot = frame.locals.get_slot(index);
    frame.stack.push_slot(slot);
}

fn load_two(frame: &mut Frame, index: usize) {
    load_one(frame, index);
    load_one(frame, index + 1);
}

/// Bounds-checked element index.
pub(super) fn check_index(index: i32, len: usize) -> Result<usize> {
    if index < 0 || index as usize >= len {
        return Err(VmError::exception(
            exceptions::ARRAY_INDEX_OUT_OF_BOUNDS,
            format!("Index {index} out of bounds for length {len}"),
        ));
    }
    Ok(index as usize)
}

fn array_load(frame: &mut Frame, op: OPCode) -> Result<()> {
    let index = frame.stack.pop_int();
    let array = pop_non_null(frame, "cannot load from a null array")?;
    let data = array.data();
    let len = data.array_length().unwrap_or(0);
    let i = check_index(index, len)?;
    let stack = &mut frame.stack;
    match (op, &*data) {
        (IALoad, ObjectData::Ints(v)) => stack.push_int(v[i]),
        (LALoad, ObjectData::Longs(v)) => stack.push_long(v[i]),
        (FALoad, ObjectData::Floats(v)) => stack.push_float(v[i]),
        (DALoad, ObjectData::Doubles(v)) => stack.push_double(v[i]),
        (AALoad, ObjectData::Refs(v)) => stack.push_ref(v[i].clone()),
        (BALoad, ObjectData::Bytes(v)) => stack.push_int(v[i] as i32),
        (CALoad, ObjectData::Chars(v)) => stack.push_int(v[i] as i32),
        (SALoad, ObjectData::Shorts(v)) => stack.push_int(v[i] as i32),
        _ => {
            return Err(VmError::Internal(format!(
                "{op} on {}",
                array.class().name()
            )))
        }
    }
    Ok(())
}
