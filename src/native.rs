//! Host implementations of `native` methods.
//!
//! A native is looked up by `<class>~<name>~<descriptor>`. Its arguments
//! are popped from the caller's operand stack into a fresh locals table
//! laid out like a frame's (receiver in slot 0 for instance methods), no
//! frame is pushed, and the native pushes its result back on the caller's
//! operand stack.
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{exceptions, Result, VmError};
use crate::heap::{Class, ClassLoader, Method, ObjectData, ObjectRef};
use crate::runtime::{LocalVars, OperandStack};

/// Everything a native method gets to work with.
pub struct NativeCall<'a> {
    /// Arguments, laid out like a frame's locals.
    pub args: LocalVars,
    /// Operand stack of the calling frame.
    pub stack: &'a mut OperandStack,
    pub loader: &'a Rc<ClassLoader>,
    pub method: &'a Rc<Method>,
}

pub type NativeMethod = fn(&mut NativeCall<'_>) -> Result<()>;

/// Registry key of a native method.
pub fn native_key(class_name: &str, name: &str, descriptor: &str) -> String {
    format!("{class_name}~{name}~{descriptor}")
}

/// Natives by key. Built up front and shared read-only by the
/// interpreter afterwards.
#[derive(Default)]
pub struct NativeRegistry {
    methods: HashMap<String, NativeMethod>,
}

impl NativeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the natives the built-in classes declare.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("java/lang/Object", "registerNatives", "()V", register_natives);
        registry.register("java/lang/System", "registerNatives", "()V", register_natives);
        registry.register("java/lang/Object", "hashCode", "()I", hash_code);
        registry.register("java/lang/Float", "floatToRawIntBits", "(F)I", float_to_raw_int_bits);
        registry.register("java/lang/Float", "intBitsToFloat", "(I)F", int_bits_to_float);
        registry.register("java/lang/Double", "doubleToRawLongBits", "(D)J", double_to_raw_long_bits);
        registry.register("java/lang/Double", "longBitsToDouble", "(J)D", long_bits_to_double);
        registry.register(
            "java/lang/System",
            "arraycopy",
            "(Ljava/lang/Object;ILjava/lang/Object;II)V",
            arraycopy,
        );
        registry
    }

    /// Register `method`, replacing any previous entry for the same key.
    pub fn register(&mut self, class_name: &str, name: &str, descriptor: &str, method: NativeMethod) {
        let key = native_key(class_name, name, descriptor);
        debug!(key = %key, "registered native");
        self.methods.insert(key, method);
    }

    pub fn find(&self, class_name: &str, name: &str, descriptor: &str) -> Result<NativeMethod> {
        let key = native_key(class_name, name, descriptor);
        self.methods.get(&key).copied().ok_or_else(|| {
            VmError::exception(
                exceptions::UNSATISFIED_LINK_ERROR,
                format!("{class_name}: no native method {key}"),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Run the native behind `method`, taking its arguments from `stack`.
    pub(crate) fn invoke(
        &self,
        method: &Rc<Method>,
        stack: &mut OperandStack,
        loader: &Rc<ClassLoader>,
    ) -> Result<()> {
        let class = method.class()?;
        let native = self.find(class.name(), method.name(), method.descriptor())?;
        let count = method.arg_slot_count();
        let mut args = LocalVars::new(count);
        for index in (0..count).rev() {
            args.set_slot(index, stack.pop_slot());
        }
        trace!(method = %method, "native call");
        native(&mut NativeCall {
            args,
            stack,
            loader,
            method,
        })
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut keys: Vec<_> = self.methods.keys().collect();
        keys.sort();
        f.debug_set().entries(keys).finish()
    }
}

fn register_natives(_: &mut NativeCall<'_>) -> Result<()> {
    Ok(())
}

fn null_argument(call: &NativeCall<'_>, index: usize) -> Result<ObjectRef> {
    call.args.get_ref(index).ok_or_else(|| {
        VmError::exception(
            exceptions::NULL_POINTER_EXCEPTION,
            format!("null argument {index} to {}", call.method),
        )
    })
}

fn hash_code(call: &mut NativeCall<'_>) -> Result<()> {
    let this = null_argument(call, 0)?;
    call.stack.push_int(this.identity_hash());
    Ok(())
}

fn float_to_raw_int_bits(call: &mut NativeCall<'_>) -> Result<()> {
    let value = call.args.get_float(0);
    call.stack.push_int(value.to_bits() as i32);
    Ok(())
}

fn int_bits_to_float(call: &mut NativeCall<'_>) -> Result<()> {
    let bits = call.args.get_int(0);
    call.stack.push_float(f32::from_bits(bits as u32));
    Ok(())
}

fn double_to_raw_long_bits(call: &mut NativeCall<'_>) -> Result<()> {
    let value = call.args.get_double(0);
    call.stack.push_long(value.to_bits() as i64);
    Ok(())
}

fn long_bits_to_double(call: &mut NativeCall<'_>) -> Result<()> {
    let bits = call.args.get_long(0);
    call.stack.push_double(f64::from_bits(bits as u64));
    Ok(())
}

fn array_store(message: String) -> VmError {
    VmError::exception(exceptions::ARRAY_STORE_EXCEPTION, message)
}

/// Arrays of a primitive component, e.g. `[I` but not `[[I`.
fn is_primitive_array(class: &Class) -> bool {
    matches!(class.name().as_bytes().get(1), Some(c) if *c != b'L' && *c != b'[')
}

fn copy_range<T: Clone>(src: &[T], src_pos: usize, dst: &mut [T], dst_pos: usize, len: usize) {
    dst[dst_pos..dst_pos + len].clone_from_slice(&src[src_pos..src_pos + len]);
}

/// Copy inside one array; the ranges may overlap.
fn copy_within(data: &mut ObjectData, src_pos: usize, dst_pos: usize, len: usize) {
    let range = src_pos..src_pos + len;
    match data {
        ObjectData::Fields(_) => {}
        ObjectData::Bytes(v) => v.copy_within(range, dst_pos),
        ObjectData::Chars(v) => v.copy_within(range, dst_pos),
        ObjectData::Shorts(v) => v.copy_within(range, dst_pos),
        ObjectData::Ints(v) => v.copy_within(range, dst_pos),
        ObjectData::Longs(v) => v.copy_within(range, dst_pos),
        ObjectData::Floats(v) => v.copy_within(range, dst_pos),
        ObjectData::Doubles(v) => v.copy_within(range, dst_pos),
        ObjectData::Refs(v) => {
            let elements = v[range].to_vec();
            v[dst_pos..dst_pos + len].clone_from_slice(&elements);
        }
    }
}

/// `System.arraycopy(src, srcPos, dest, destPos, length)`.
fn arraycopy(call: &mut NativeCall<'_>) -> Result<()> {
    let src = null_argument(call, 0)?;
    let dst = null_argument(call, 2)?;
    let (src_pos, dst_pos, len) = (call.args.get_int(1), call.args.get_int(3), call.args.get_int(4));

    for array in [&src, &dst] {
        if !array.is_array() {
            return Err(array_store(format!(
                "arraycopy: {} is not an array",
                array.class().name()
            )));
        }
    }
    if (is_primitive_array(src.class()) || is_primitive_array(dst.class()))
        && src.class().name() != dst.class().name()
    {
        return Err(array_store(format!(
            "arraycopy: type mismatch: can not copy {} into {}",
            src.class().name(),
            dst.class().name()
        )));
    }

    let src_len = src.array_length().unwrap_or(0) as i64;
    let dst_len = dst.array_length().unwrap_or(0) as i64;
    if src_pos < 0
        || dst_pos < 0
        || len < 0
        || src_pos as i64 + len as i64 > src_len
        || dst_pos as i64 + len as i64 > dst_len
    {
        return Err(VmError::exception(
            exceptions::ARRAY_INDEX_OUT_OF_BOUNDS,
            format!(
                "arraycopy: range [{src_pos}, {src_pos} + {len}) of length {src_len} into [{dst_pos}, {dst_pos} + {len}) of length {dst_len}"
            ),
        ));
    }
    let (src_pos, dst_pos, len) = (src_pos as usize, dst_pos as usize, len as usize);

    if Rc::ptr_eq(&src, &dst) {
        copy_within(&mut dst.data_mut(), src_pos, dst_pos, len);
        return Ok(());
    }

    let component = dst.class().component_class()?;
    let src_data = src.data();
    let mut dst_data = dst.data_mut();
    match (&*src_data, &mut *dst_data) {
        (ObjectData::Bytes(s), ObjectData::Bytes(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Chars(s), ObjectData::Chars(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Shorts(s), ObjectData::Shorts(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Ints(s), ObjectData::Ints(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Longs(s), ObjectData::Longs(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Floats(s), ObjectData::Floats(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Doubles(s), ObjectData::Doubles(d)) => copy_range(s, src_pos, d, dst_pos, len),
        (ObjectData::Refs(s), ObjectData::Refs(d)) => {
            // Elements before an incompatible one stay copied.
            for i in 0..len {
                let element = &s[src_pos + i];
                if let (Some(object), Some(component)) = (element, &component) {
                    if !object.is_instance_of(component) {
                        return Err(array_store(format!(
                            "arraycopy: element type mismatch: {} stored into {}",
                            object.class().name(),
                            dst.class().name()
                        )));
                    }
                }
                d[dst_pos + i] = element.clone();
            }
        }
        _ => {
            return Err(array_store(format!(
                "arraycopy: type mismatch: can not copy {} into {}",
                src.class().name(),
                dst.class().name()
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup(class_name: &str, name: &str, descriptor: &str) -> (Rc<ClassLoader>, Rc<Method>) {
        let loader = ClassLoader::new(".");
        let class = loader.load_class(class_name).unwrap();
        let method = class.get_method(name, descriptor).unwrap();
        (loader, method)
    }

    #[test]
    fn missing_native_is_unsatisfied_link() {
        let registry = NativeRegistry::new();
        assert!(registry.is_empty());
        let err = registry.find("a/B", "run", "()V").unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::UNSATISFIED_LINK_ERROR));
        assert!(err.to_string().contains("a/B~run~()V"));
    }

    #[test]
    fn defaults_cover_builtin_natives() {
        let registry = NativeRegistry::with_defaults();
        assert_eq!(registry.len(), 8);
        assert!(registry.find("java/lang/Object", "hashCode", "()I").is_ok());
        assert!(registry.find("java/lang/Object", "hashCode", "()J").is_err());
    }

    #[test]
    fn arguments_come_from_the_caller_stack() {
        let (loader, method) = setup("java/lang/Double", "doubleToRawLongBits", "(D)J");
        let registry = NativeRegistry::with_defaults();
        let mut stack = OperandStack::new(3);
        stack.push_int(7);
        stack.push_double(-2.5);
        registry.invoke(&method, &mut stack, &loader).unwrap();
        assert_eq!(stack.pop_long(), (-2.5f64).to_bits() as i64);
        assert_eq!(stack.pop_int(), 7);
        assert!(stack.is_empty());
    }

    #[test]
    fn float_bits() {
        let (loader, method) = setup("java/lang/Float", "intBitsToFloat", "(I)F");
        let registry = NativeRegistry::with_defaults();
        let mut stack = OperandStack::new(1);
        stack.push_int(0x3fc0_0000);
        registry.invoke(&method, &mut stack, &loader).unwrap();
        assert_eq!(stack.pop_float(), 1.5);
    }

    fn int_array(loader: &Rc<ClassLoader>, values: &[i32]) -> ObjectRef {
        let array = loader.load_class("[I").unwrap().new_array(values.len()).unwrap();
        if let ObjectData::Ints(v) = &mut *array.data_mut() {
            v.copy_from_slice(values);
        }
        array
    }

    fn arraycopy_call(
        loader: &Rc<ClassLoader>,
        method: &Rc<Method>,
        src: &ObjectRef,
        src_pos: i32,
        dst: &ObjectRef,
        dst_pos: i32,
        len: i32,
    ) -> Result<()> {
        let mut stack = OperandStack::new(5);
        stack.push_ref(Some(src.clone()));
        stack.push_int(src_pos);
        stack.push_ref(Some(dst.clone()));
        stack.push_int(dst_pos);
        stack.push_int(len);
        NativeRegistry::with_defaults().invoke(method, &mut stack, loader)
    }

    #[test]
    fn arraycopy_copies_and_checks_bounds() {
        let (loader, method) = setup(
            "java/lang/System",
            "arraycopy",
            "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        );
        let src = int_array(&loader, &[1, 2, 3, 4]);
        let dst = int_array(&loader, &[0, 0, 0]);
        arraycopy_call(&loader, &method, &src, 1, &dst, 0, 3).unwrap();
        assert_eq!(*dst.data(), ObjectData::Ints(vec![2, 3, 4]));

        // Overlapping ranges in the same array.
        arraycopy_call(&loader, &method, &src, 0, &src, 1, 3).unwrap();
        assert_eq!(*src.data(), ObjectData::Ints(vec![1, 1, 2, 3]));

        let err = arraycopy_call(&loader, &method, &src, 2, &dst, 0, 3).unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::ARRAY_INDEX_OUT_OF_BOUNDS));

        let chars = loader.load_class("[C").unwrap().new_array(4).unwrap();
        let err = arraycopy_call(&loader, &method, &chars, 0, &dst, 0, 1).unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::ARRAY_STORE_EXCEPTION));
    }
}
