//! Interpreter for JVM bytecode.
//!
//! The interpreter owns the class loader and the native registry and runs
//! threads one instruction at a time. Each step decodes the instruction at
//! the top frame's `next_pc`, moves `next_pc` past it, then executes it.
//! Java exceptions raised by an instruction are materialized as throwable
//! objects and dispatched through the exception tables of the frames on
//! the stack.
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::BytecodeReader;
use crate::descriptor::{BaseTypeKind, Type};
use crate::error::{exceptions, Result, VmError};
use crate::heap::{ClassLoader, Method, ObjectData, ObjectRef};
use crate::instructions::{init_class, Instruction};
use crate::native::NativeRegistry;
use crate::options::VmOptions;
use crate::runtime::{Frame, OperandStack, Thread, Value};

const JAVA_LANG_STRING_ARRAY: &str = "[Ljava/lang/String;";

/// `Interpreter` for a stack based virtual machine for JVM bytecode.
pub struct Interpreter {
    loader: Rc<ClassLoader>,
    natives: Rc<NativeRegistry>,
    options: VmOptions,
}

impl Interpreter {
    /// An interpreter with the default natives.
    pub fn new(options: VmOptions) -> Self {
        Self::with_natives(options, NativeRegistry::with_defaults())
    }

    /// An interpreter using `natives`. The registry cannot change once the
    /// interpreter owns it.
    pub fn with_natives(options: VmOptions, natives: NativeRegistry) -> Self {
        Self {
            loader: ClassLoader::new(options.classpath.clone()),
            natives: Rc::new(natives),
            options,
        }
    }

    pub fn loader(&self) -> &Rc<ClassLoader> {
        &self.loader
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// A thread whose stack holds at most `max_stack_depth` frames.
    pub fn new_thread(&self) -> Thread {
        Thread::new(self.options.max_stack_depth)
    }

    /// Step `thread` until its frame stack is empty. Returns the value
    /// returned by the bottom frame.
    pub fn run(&self, thread: &mut Thread) -> Result<Option<Value>> {
        while !thread.is_stack_empty() {
            self.step(thread)?;
        }
        Ok(thread.take_return_value())
    }

    /// Decode and execute one instruction of the top frame.
    pub fn step(&self, thread: &mut Thread) -> Result<()> {
        let frame = thread.current_frame()?;
        let method = frame.method().clone();
        let pc = frame.next_pc;
        thread.set_pc(pc);

        let mut reader = BytecodeReader::new(method.code(), pc);
        let inst = Instruction::decode(&mut reader)?;
        let frame = thread.current_frame()?;
        frame.pc = Some(pc);
        frame.next_pc = reader.pc();
        if self.options.trace_instructions {
            trace!(method = %method, pc, instruction = ?inst, "execute");
        }

        let depth = thread.stack().size();
        match inst.execute(thread, self) {
            Ok(()) => Ok(()),
            Err(VmError::Exception {
                class_name,
                message,
            }) => {
                let exception = self
                    .new_throwable(&class_name, &message)
                    .map_err(|_| VmError::Uncaught {
                        class_name,
                        message,
                    })?;
                self.throw(thread, depth, exception)
            }
            Err(VmError::Thrown(exception)) => self.throw(thread, depth, exception),
            Err(err) => Err(err),
        }
    }

    /// Run `method` to completion on `thread` with `args`, initializing
    /// its class first if needed. `args` must fill exactly the method's
    /// argument slots, receiver included.
    pub fn invoke(
        &self,
        thread: &mut Thread,
        method: &Rc<Method>,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let slots: usize = args.iter().map(Value::size).sum();
        if slots != method.arg_slot_count() {
            return Err(VmError::Internal(format!(
                "{method} takes {} argument slots, got {slots}",
                method.arg_slot_count()
            )));
        }

        if method.is_native() {
            let slots = slots.max(method.parsed_descriptor().return_type.size());
            let mut stack = OperandStack::new(slots);
            for arg in args {
                stack.push_value(arg);
            }
            self.natives.invoke(method, &mut stack, &self.loader)?;
            return Ok(pop_return(&mut stack, &method.parsed_descriptor().return_type));
        }

        let mut frame = Frame::new(method.clone())?;
        let mut index = 0;
        for arg in args {
            frame.locals.set_value(index, arg);
            index += arg.size();
        }
        thread.push_frame(frame)?;
        let class = method.class()?;
        if !class.init_started() {
            init_class(thread, &class)?;
        }
        self.run(thread)
    }

    /// Load `class_name` and run its `main(String[])` with `args`.
    pub fn run_main(&self, class_name: &str, args: &[String]) -> Result<()> {
        let class = self.loader.load_class(&class_name.replace('.', "/"))?;
        let main = class.main_method().ok_or_else(|| {
            VmError::exception(
                exceptions::NO_SUCH_METHOD_ERROR,
                format!("{}.main([Ljava/lang/String;)V", class.name()),
            )
        })?;

        let array = self
            .loader
            .load_class(JAVA_LANG_STRING_ARRAY)?
            .new_array(args.len())?;
        if let ObjectData::Refs(elements) = &mut *array.data_mut() {
            for (element, arg) in elements.iter_mut().zip(args) {
                *element = Some(self.loader.new_string(arg)?);
            }
        }

        debug!(class = class.name(), "running main");
        let mut thread = self.new_thread();
        self.invoke(&mut thread, &main, &[Value::Reference(Some(array))])?;
        Ok(())
    }

    /// Instance of the throwable class `class_name` carrying `message`.
    /// The constructor is not run; the detail message is set directly.
    fn new_throwable(&self, class_name: &str, message: &str) -> Result<ObjectRef> {
        let class = self.loader.load_class(class_name)?;
        let exception = class.new_object();
        if let Some(field) = class.find_field("detailMessage", "Ljava/lang/String;") {
            let message = self.loader.new_string(message)?;
            exception.with_fields(|fields| fields.set_ref(field.slot_id(), Some(message)));
        }
        Ok(exception)
    }

    /// Unwind to the nearest handler of `exception`. Frames pushed by the
    /// failing instruction are discarded first. Callers are matched at the
    /// instruction that called or initialized, and frames that never ran
    /// (pending `<clinit>`s) cannot catch.
    fn throw(&self, thread: &mut Thread, depth: usize, exception: ObjectRef) -> Result<()> {
        while thread.stack().size() > depth {
            thread.pop_frame()?;
        }
        while let Some(frame) = thread.top_frame() {
            if let Some(handler_pc) = frame.pc.and_then(|pc| find_handler(frame, pc, &exception)) {
                debug!(
                    exception = exception.class().name(),
                    method = %frame.method(),
                    handler_pc,
                    "caught"
                );
                let frame = thread.current_frame()?;
                frame.stack.clear();
                frame.stack.push_ref(Some(exception));
                frame.next_pc = handler_pc;
                return Ok(());
            }
            thread.pop_frame()?;
        }
        Err(uncaught(&exception))
    }
}

/// Handler in `frame`'s method covering `pc` and catching `exception`. A
/// catch type that fails to resolve matches nothing.
fn find_handler(frame: &Frame, pc: usize, exception: &ObjectRef) -> Option<usize> {
    frame
        .method()
        .exception_table()
        .iter()
        .filter(|handler| handler.covers(pc))
        .find(|handler| match handler.catch_type {
            None => true,
            Some(index) => match frame.class().constant_pool().resolve_class(index) {
                Ok(class) => exception.is_instance_of(&class),
                Err(err) => {
                    debug!(method = %frame.method(), index, error = %err, "unresolvable catch type");
                    false
                }
            },
        })
        .map(|handler| handler.handler_pc)
}

fn uncaught(exception: &ObjectRef) -> VmError {
    let class = exception.class();
    let message = class
        .find_field("detailMessage", "Ljava/lang/String;")
        .and_then(|field| exception.with_fields(|fields| fields.get_ref(field.slot_id())))
        .flatten()
        .and_then(|message| message.string_value())
        .unwrap_or_default();
    VmError::Uncaught {
        class_name: class.name().to_string(),
        message,
    }
}

fn pop_return(stack: &mut OperandStack, return_type: &Type) -> Option<Value> {
    let value = match return_type.t {
        BaseTypeKind::Void => return None,
        BaseTypeKind::Long => Value::Long(stack.pop_long()),
        BaseTypeKind::Float => Value::Float(stack.pop_float()),
        BaseTypeKind::Double => Value::Double(stack.pop_double()),
        BaseTypeKind::Object(_) | BaseTypeKind::List => Value::Reference(stack.pop_ref()),
        _ => Value::Int(stack.pop_int()),
    };
    Some(value)
}
