//! ristretto: a minimal interpreting Java virtual machine.
//!
//! Class files are decoded by [`jvm`], turned into runtime classes by the
//! [`heap::ClassLoader`] and executed by the [`Interpreter`].
pub mod bytecode;
pub mod descriptor;
pub mod error;
pub mod heap;
pub mod instructions;
pub mod interpreter;
pub mod jvm;
pub mod native;
pub mod options;
pub mod runtime;

pub use error::{ClassFormatError, Result, VmError};
pub use heap::{Class, ClassLoader, Method, ObjectRef};
pub use interpreter::Interpreter;
pub use native::{NativeCall, NativeMethod, NativeRegistry};
pub use options::VmOptions;
pub use runtime::{Frame, Thread, Value};
