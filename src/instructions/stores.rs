//! Stores into local variables and arrays.
use crate::bytecode::OPCode::{self, *};
use crate::error::{exceptions, Result, VmError};
use crate::heap::ObjectData;
use crate::instructions::loads::check_index;
use crate::instructions::{pop_non_null, unexpected, Instruction};
use crate::runtime::{Frame, Thread};

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let op = inst.get_mnemonic();
    match op {
        IStore | FStore | AStore => store_one(frame, inst.local_index()?),
        LStore | DStore => store_two(frame, inst.local_index()?),
        IStore0 | FStore0 | AStore0 => store_one(frame, 0),
        IStore1 | FStore1 | AStore1 => store_one(frame, 1),
        IStore2 | FStore2 | AStore2 => store_one(frame, 2),
        IStore3 | FStore3 | AStore3 => store_one(frame, 3),
        LStore0 | DStore0 => store_two(frame, 0),
        LStore1 | DStore1 => store_two(frame, 1),
        LStore2 | DStore2 => store_two(frame, 2),
        LStore3 | DStore3 => store_two(frame, 3),
        AAStore => return reference_array_store(frame),
        IAStore | LAStore | FAStore | DAStore | BAStore | CAStore | SAStore => {
            return array_store(frame, op)
        }
        _ => return Err(unexpected(inst)),
    }
    Ok(())
}

fn store_one(frame: &mut Frame, index: usize) {
    let slot = frame.stack.pop_slot();
    frame.locals.set_slot(index, slot);
}

fn store_two(frame: &mut Frame, index: usize) {
    store_one(frame, index + 1);
    store_one(frame, index);
}

fn array_store(frame: &mut Frame, op: OPCode) -> Result<()> {
    let stack = &mut frame.stack;
    // Category 2 values sit above the index.
    let (int, long, float, double) = match op {
        LAStore => (0, stack.pop_long(), 0.0, 0.0),
        FAStore => (0, 0, stack.pop_float(), 0.0),
        DAStore => (0, 0, 0.0, stack.pop_double()),
        _ => (stack.pop_int(), 0, 0.0, 0.0),
    };
    let index = stack.pop_int();
    let array = pop_non_null(frame, "cannot store to a null array")?;
    let boolean = array.class().name() == "[Z";
    let mut data = array.data_mut();
    let len = data.array_length().unwrap_or(0);
    let i = check_index(index, len)?;
    match (op, &mut *data) {
        (IAStore, ObjectData::Ints(v)) => v[i] = int,
        (LAStore, ObjectData::Longs(v)) => v[i] = long,
        (FAStore, ObjectData::Floats(v)) => v[i] = float,
        (DAStore, ObjectData::Doubles(v)) => v[i] = double,
        (BAStore, ObjectData::Bytes(v)) if boolean => v[i] = (int & 1) as i8,
        (BAStore, ObjectData::Bytes(v)) => v[i] = int as i8,
        (CAStore, ObjectData::Chars(v)) => v[i] = int as u16,
        (SAStore, ObjectData::Shorts(v)) => v[i] = int as i16,
        _ => {
            return Err(VmError::Internal(format!(
                "{op} on {}",
                array.class().name()
            )))
        }
    }
    Ok(())
}

fn reference_array_store(frame: &mut Frame) -> Result<()> {
    let value = frame.stack.pop_ref();
    let index = frame.stack.pop_int();
    let array = pop_non_null(frame, "cannot store to a null array")?;
    if let (Some(value), Some(component)) = (&value, array.class().component_class()?) {
        if !value.is_instance_of(&component) {
            return Err(VmError::exception(
                exceptions::ARRAY_STORE_EXCEPTION,
                value.class().name(),
            ));
        }
    }
    let mut data = array.data_mut();
    let len = data.array_length().unwrap_or(0);
    let i = check_index(index, len)?;
    match &mut *data {
        ObjectData::Refs(v) => v[i] = value,
        _ => {
            return Err(VmError::Internal(format!(
                "aastore on {}",
                array.class().name()
            )))
        }
    }
    Ok(())
}
