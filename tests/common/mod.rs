#![allow(dead_code)]

use std::rc::Rc;

use ristretto::jvm::builder::ClassFileBuilder;
use ristretto::jvm::AccessFlags;
use ristretto::runtime::Slots;
use ristretto::{Class, Frame, Interpreter, Method, Result, Value, VmOptions};

pub const OBJECT: &str = "java/lang/Object";

pub fn public_static() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::STATIC
}

pub fn vm() -> Interpreter {
    Interpreter::new(VmOptions::default())
}

pub fn define(vm: &Interpreter, builder: &ClassFileBuilder) -> Rc<Class> {
    vm.loader().define(&builder.build()).unwrap()
}

pub fn method(class: &Rc<Class>, name: &str, descriptor: &str) -> Rc<Method> {
    class.get_method(name, descriptor).unwrap()
}

/// Constructor that only calls `super_name.<init>()V`.
pub fn add_default_constructor(builder: &mut ClassFileBuilder, super_name: &str) {
    let [hi, lo] = builder.method_ref(super_name, "<init>", "()V").to_be_bytes();
    builder.add_method(
        AccessFlags::PUBLIC,
        "<init>",
        "()V",
        1,
        1,
        vec![0x2a, 0xb7, hi, lo, 0xb1],
    );
}

/// Invoke the static `run()I` of `class` and return its result.
pub fn run_int(vm: &Interpreter, class: &Rc<Class>) -> Result<i32> {
    let run = method(class, "run", "()I");
    let mut thread = vm.new_thread();
    let value = vm.invoke(&mut thread, &run, &[])?;
    Ok(value.and_then(|v| v.as_int()).unwrap())
}

/// Step a lone static `run()V` holding `code` until it reaches its final
/// `return`, and hand back its locals.
pub fn run_to_return(code: Vec<u8>, max_stack: u16, max_locals: u16) -> Slots {
    let vm = vm();
    let mut builder = ClassFileBuilder::new("Scenario", Some(OBJECT));
    builder.add_method(public_static(), "run", "()V", max_stack, max_locals, code);
    let class = define(&vm, &builder);
    let run = method(&class, "run", "()V");

    let mut thread = vm.new_thread();
    thread.push_frame(Frame::new(run.clone()).unwrap()).unwrap();
    loop {
        let frame = thread.top_frame().unwrap();
        assert_eq!(thread.stack().size(), 1);
        if run.code()[frame.next_pc] == 0xb1 {
            return frame.locals.clone();
        }
        vm.step(&mut thread).unwrap();
    }
}

pub fn int(value: Option<Value>) -> i32 {
    value.and_then(|v| v.as_int()).unwrap()
}
