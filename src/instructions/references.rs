//! Field access, object and array creation, type checks, `athrow` and
//! monitors.
use std::rc::Rc;

use crate::bytecode::OPCode::*;
use crate::error::{exceptions, Result, VmError};
use crate::heap::{Field, ObjectRef};
use crate::instructions::{defer_to_initialization, pop_non_null, unexpected, Instruction, Operands};
use crate::runtime::{Frame, Slot, Thread};

pub(super) fn execute(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    match inst.get_mnemonic() {
        GetStatic => get_static(inst, thread),
        PutStatic => put_static(inst, thread),
        GetField => get_field(inst, thread),
        PutField => put_field(inst, thread),
        New => new_object(inst, thread),
        NewArray => new_array(inst, thread),
        ANewArray => new_reference_array(inst, thread),
        ArrayLength => {
            let frame = thread.current_frame()?;
            let array = pop_non_null(frame, "cannot read the length of a null array")?;
            let len = array
                .array_length()
                .ok_or_else(|| VmError::Internal(format!("arraylength on {array:?}")))?;
            frame.stack.push_int(len as i32);
            Ok(())
        }
        AThrow => {
            let frame = thread.current_frame()?;
            let exception = pop_non_null(frame, "cannot throw null")?;
            Err(VmError::Thrown(exception))
        }
        CheckCast => {
            let frame = thread.current_frame()?;
            let Some(object) = frame.stack.top_ref(0) else {
                return Ok(());
            };
            let class = frame.class().constant_pool().resolve_class(inst.cp_index()?)?;
            if !object.is_instance_of(&class) {
                return Err(VmError::exception(
                    exceptions::CLASS_CAST_EXCEPTION,
                    format!("{} cannot be cast to {}", object.class().name(), class.name()),
                ));
            }
            Ok(())
        }
        InstanceOf => {
            let frame = thread.current_frame()?;
            let result = match frame.stack.pop_ref() {
                Some(object) => {
                    let class = frame.class().constant_pool().resolve_class(inst.cp_index()?)?;
                    object.is_instance_of(&class)
                }
                None => false,
            };
            frame.stack.push_int(result as i32);
            Ok(())
        }
        // Single threaded: monitors only need the null check.
        MonitorEnter | MonitorExit => {
            let frame = thread.current_frame()?;
            pop_non_null(frame, "cannot synchronize on null")?;
            Ok(())
        }
        _ => Err(unexpected(inst)),
    }
}

fn resolve_field(inst: &Instruction, frame: &Frame, is_static: bool) -> Result<Rc<Field>> {
    let field = frame.class().constant_pool().resolve_field(inst.cp_index()?)?;
    if field.is_static() != is_static {
        return Err(VmError::exception(
            exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR,
            format!(
                "{} expects a {} field, {} is not",
                inst.get_mnemonic(),
                if is_static { "static" } else { "non-static" },
                field.name()
            ),
        ));
    }
    Ok(field)
}

/// Pop the one or two slots of a field value.
fn pop_field_value(frame: &mut Frame, field: &Field) -> (Slot, Option<Slot>) {
    if field.is_wide() {
        let high = frame.stack.pop_slot();
        let low = frame.stack.pop_slot();
        (low, Some(high))
    } else {
        (frame.stack.pop_slot(), None)
    }
}

fn get_static(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let field = resolve_field(inst, thread.current_frame()?, true)?;
    let class = field.class()?;
    if defer_to_initialization(thread, &class)? {
        return Ok(());
    }
    let frame = thread.current_frame()?;
    let statics = class.static_vars();
    let id = field.slot_id();
    frame.stack.push_slot(statics.get_slot(id));
    if field.is_wide() {
        frame.stack.push_slot(statics.get_slot(id + 1));
    }
    Ok(())
}

fn put_static(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let field = resolve_field(inst, thread.current_frame()?, true)?;
    let class = field.class()?;
    if defer_to_initialization(thread, &class)? {
        return Ok(());
    }
    let frame = thread.current_frame()?;
    let (low, high) = pop_field_value(frame, &field);
    let mut statics = class.static_vars_mut();
    let id = field.slot_id();
    statics.set_slot(id, low);
    if let Some(high) = high {
        statics.set_slot(id + 1, high);
    }
    Ok(())
}

fn instance_fields_error(object: &ObjectRef) -> VmError {
    VmError::exception(
        exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR,
        format!("{} has no instance fields", object.class().name()),
    )
}

fn get_field(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let field = resolve_field(inst, frame, false)?;
    let object = pop_non_null(frame, &format!("cannot read field {}", field.name()))?;
    let id = field.slot_id();
    let (low, high) = object
        .with_fields(|fields| {
            let high = field.is_wide().then(|| fields.get_slot(id + 1));
            (fields.get_slot(id), high)
        })
        .ok_or_else(|| instance_fields_error(&object))?;
    frame.stack.push_slot(low);
    if let Some(high) = high {
        frame.stack.push_slot(high);
    }
    Ok(())
}

fn put_field(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let field = resolve_field(inst, frame, false)?;
    let (low, high) = pop_field_value(frame, &field);
    let object = pop_non_null(frame, &format!("cannot assign field {}", field.name()))?;
    let id = field.slot_id();
    object
        .with_fields(|fields| {
            fields.set_slot(id, low);
            if let Some(high) = high {
                fields.set_slot(id + 1, high);
            }
        })
        .ok_or_else(|| instance_fields_error(&object))
}

fn new_object(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let class = thread
        .current_frame()?
        .class()
        .constant_pool()
        .resolve_class(inst.cp_index()?)?;
    if class.is_interface() || class.is_abstract() {
        return Err(VmError::exception(exceptions::INSTANTIATION_ERROR, class.name()));
    }
    if defer_to_initialization(thread, &class)? {
        return Ok(());
    }
    thread.current_frame()?.stack.push_ref(Some(class.new_object()));
    Ok(())
}

/// Pop an array length, rejecting negative counts.
pub(super) fn pop_count(frame: &mut Frame) -> Result<usize> {
    let count = frame.stack.pop_int();
    if count < 0 {
        return Err(VmError::exception(
            exceptions::NEGATIVE_ARRAY_SIZE,
            count.to_string(),
        ));
    }
    Ok(count as usize)
}

/// Array class name for a `newarray` type code.
fn primitive_array_class(atype: u8) -> Option<&'static str> {
    let name = match atype {
        4 => "[Z",
        5 => "[C",
        6 => "[F",
        7 => "[D",
        8 => "[B",
        9 => "[S",
        10 => "[I",
        11 => "[J",
        _ => return None,
    };
    Some(name)
}

fn new_array(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let atype = match inst.params() {
        Operands::ArrayType(atype) => *atype,
        _ => return Err(inst.bad_operands()),
    };
    let class_name = primitive_array_class(atype)
        .ok_or_else(|| VmError::Internal(format!("invalid newarray type {atype}")))?;
    let count = pop_count(frame)?;
    let class = frame.class().loader()?.load_class(class_name)?;
    frame.stack.push_ref(Some(class.new_array(count)?));
    Ok(())
}

fn new_reference_array(inst: &Instruction, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame()?;
    let component = frame.class().constant_pool().resolve_class(inst.cp_index()?)?;
    let count = pop_count(frame)?;
    let class = component.loader()?.load_class(&component.array_class_name())?;
    frame.stack.push_ref(Some(class.new_array(count)?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newarray_type_codes() {
        assert_eq!(primitive_array_class(4), Some("[Z"));
        assert_eq!(primitive_array_class(10), Some("[I"));
        assert_eq!(primitive_array_class(11), Some("[J"));
        assert_eq!(primitive_array_class(3), None);
        assert_eq!(primitive_array_class(12), None);
    }
}
