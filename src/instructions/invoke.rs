//! Method invocation.
//!
//! Arguments are moved slot by slot from the caller's operand stack into
//! the locals of a fresh frame, receiver first for instance methods.
use std::rc::Rc;

use tracing::trace;

use crate::bytecode::OPCode::*;
use crate::error::{exceptions, Result, VmError};
use crate::heap::symref::{lookup_method, lookup_method_in_interfaces};
use crate::heap::{Class, Method, ObjectRef};
use crate::instructions::{defer_to_initialization, null_pointer, unexpected, Instruction};
use crate::interpreter::Interpreter;
use crate::runtime::{Frame, Thread};

pub(super) fn execute(inst: &Instruction, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
    match inst.get_mnemonic() {
        InvokeStatic => invoke_static(inst, thread, vm),
        InvokeSpecial => invoke_special(inst, thread, vm),
        InvokeVirtual => invoke_virtual(inst, thread, vm),
        InvokeInterface => invoke_interface(inst, thread, vm),
        InvokeDynamic => Err(VmError::Unsupported("invokedynamic".to_string())),
        _ => Err(unexpected(inst)),
    }
}

/// Invoke `method` with its arguments on top of the current frame's
/// operand stack. Natives run in place; everything else gets a new frame.
pub(super) fn invoke_method(thread: &mut Thread, vm: &Interpreter, method: Rc<Method>) -> Result<()> {
    trace!(method = %method, "invoke");
    if method.is_native() {
        let caller = thread.current_frame()?;
        return vm.natives().invoke(&method, &mut caller.stack, vm.loader());
    }
    if method.is_abstract() {
        return Err(abstract_method(&method));
    }
    let mut frame = Frame::new(method.clone())?;
    let caller = thread.current_frame()?;
    for index in (0..method.arg_slot_count()).rev() {
        frame.locals.set_slot(index, caller.stack.pop_slot());
    }
    thread.push_frame(frame)
}

fn abstract_method(method: &Method) -> VmError {
    VmError::exception(exceptions::ABSTRACT_METHOD_ERROR, method.to_string())
}

fn incompatible(message: String) -> VmError {
    VmError::exception(exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR, message)
}

/// Resolve the method referenced by the instruction, along with the
/// class named by the symbolic reference.
fn resolve(inst: &Instruction, frame: &Frame) -> Result<(Rc<Method>, Rc<Class>)> {
    let pool = frame.class().constant_pool();
    let index = inst.cp_index()?;
    let method = pool.resolve_method(index)?;
    let (method_ref, _) = pool.method_ref(index)?;
    let class = method_ref.class_ref().resolved_class(pool)?;
    Ok((method, class))
}

/// The receiver sits below the arguments; `arg_slot_count` includes it.
fn receiver(frame: &Frame, method: &Method) -> Result<ObjectRef> {
    let depth = method.arg_slot_count().saturating_sub(1);
    frame
        .stack
        .top_ref(depth)
        .ok_or_else(|| null_pointer(&format!("cannot invoke {method} on null")))
}

fn invoke_static(inst: &Instruction, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
    let (method, _) = resolve(inst, thread.current_frame()?)?;
    if !method.is_static() {
        return Err(incompatible(format!("{method} is not static")));
    }
    let class = method.class()?;
    if defer_to_initialization(thread, &class)? {
        return Ok(());
    }
    invoke_method(thread, vm, method)
}

fn invoke_special(inst: &Instruction, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
    let frame = thread.current_frame()?;
    let current = frame.class().clone();
    let (resolved, class) = resolve(inst, frame)?;
    if resolved.is_static() {
        return Err(incompatible(format!("{resolved} is static")));
    }
    if resolved.is_constructor() && resolved.class()?.name() != class.name() {
        return Err(VmError::exception(
            exceptions::NO_SUCH_METHOD_ERROR,
            format!("{}.{}{}", class.name(), resolved.name(), resolved.descriptor()),
        ));
    }
    receiver(frame, &resolved)?;

    // `super.m()` from an ACC_SUPER class starts the search at the direct
    // super class of the caller.
    let method = if current.is_super()
        && !resolved.is_constructor()
        && !class.is_interface()
        && current.is_subclass_of(&class)
    {
        current
            .super_class()
            .and_then(|super_class| lookup_method(&super_class, resolved.name(), resolved.descriptor()))
            .ok_or_else(|| abstract_method(&resolved))?
    } else {
        resolved
    };
    invoke_method(thread, vm, method)
}

fn invoke_virtual(inst: &Instruction, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
    let frame = thread.current_frame()?;
    let (resolved, _) = resolve(inst, frame)?;
    if resolved.is_static() {
        return Err(incompatible(format!("{resolved} is static")));
    }
    let object = receiver(frame, &resolved)?;
    let method = if resolved.is_private() {
        resolved
    } else {
        lookup_method(object.class(), resolved.name(), resolved.descriptor())
            .ok_or_else(|| abstract_method(&resolved))?
    };
    invoke_method(thread, vm, method)
}

fn invoke_interface(inst: &Instruction, thread: &mut Thread, vm: &Interpreter) -> Result<()> {
    let frame = thread.current_frame()?;
    let (resolved, interface) = resolve(inst, frame)?;
    if resolved.is_static() {
        return Err(incompatible(format!("{resolved} is static")));
    }
    let object = receiver(frame, &resolved)?;
    let class = object.class();
    if !class.is_implementing(&interface) {
        return Err(incompatible(format!(
            "{} does not implement {}",
            class.name(),
            interface.name()
        )));
    }
    let (name, descriptor) = (resolved.name(), resolved.descriptor());
    let method = lookup_method(class, name, descriptor)
        .filter(|m| !m.is_abstract())
        .or_else(|| default_method(class, name, descriptor))
        .ok_or_else(|| abstract_method(&resolved))?;
    invoke_method(thread, vm, method)
}

/// First non-abstract interface method inherited by `class`.
fn default_method(class: &Rc<Class>, name: &str, descriptor: &str) -> Option<Rc<Method>> {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(method) = lookup_method_in_interfaces(c.interfaces(), name, descriptor)
            .filter(|m| !m.is_abstract())
        {
            return Some(method);
        }
        current = c.super_class();
    }
    None
}
