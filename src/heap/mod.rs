//! The method area and the object heap.
//!
//! Runtime classes are shared through `Rc`. Everything a class owns
//! (fields, methods, its constant pool) points back at it weakly, and a
//! class points weakly at the loader that defined it; the loader holds
//! the strong references.
pub mod bootstrap;
pub mod class;
pub mod class_loader;
pub mod constant_pool;
pub mod member;
pub mod object;
pub mod symref;

pub use class::{array_class_name, Class};
pub use class_loader::ClassLoader;
pub use constant_pool::{Constant, ConstantPool};
pub use member::{ExceptionHandler, Field, Method};
pub use object::{Object, ObjectData, ObjectRef};
pub use symref::{ClassRef, FieldRef, MemberRef, MethodRef};
