//! Objects and arrays.
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::heap::Class;
use crate::runtime::Slots;

pub type ObjectRef = Rc<Object>;

/// Storage of an object: instance fields for plain objects, a typed
/// element buffer for arrays. Boolean arrays share the byte buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    Fields(Slots),
    Bytes(Vec<i8>),
    Chars(Vec<u16>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
    Refs(Vec<Option<ObjectRef>>),
}

impl ObjectData {
    /// Zeroed array storage for an array class name such as `[I`.
    pub fn new_array(class_name: &str, len: usize) -> Option<Self> {
        let component = class_name.strip_prefix('[')?;
        let data = match component.as_bytes().first()? {
            b'Z' | b'B' => ObjectData::Bytes(vec![0; len]),
            b'C' => ObjectData::Chars(vec![0; len]),
            b'S' => ObjectData::Shorts(vec![0; len]),
            b'I' => ObjectData::Ints(vec![0; len]),
            b'J' => ObjectData::Longs(vec![0; len]),
            b'F' => ObjectData::Floats(vec![0.0; len]),
            b'D' => ObjectData::Doubles(vec![0.0; len]),
            b'L' | b'[' => ObjectData::Refs(vec![None; len]),
            _ => return None,
        };
        Some(data)
    }

    /// Element count, `None` for plain objects.
    pub fn array_length(&self) -> Option<usize> {
        let len = match self {
            ObjectData::Fields(_) => return None,
            ObjectData::Bytes(v) => v.len(),
            ObjectData::Chars(v) => v.len(),
            ObjectData::Shorts(v) => v.len(),
            ObjectData::Ints(v) => v.len(),
            ObjectData::Longs(v) => v.len(),
            ObjectData::Floats(v) => v.len(),
            ObjectData::Doubles(v) => v.len(),
            ObjectData::Refs(v) => v.len(),
        };
        Some(len)
    }
}

/// A heap object. Objects are never freed.
pub struct Object {
    class: Rc<Class>,
    data: RefCell<ObjectData>,
}

impl Object {
    /// Allocate an instance with zeroed fields.
    pub fn new(class: Rc<Class>) -> ObjectRef {
        let fields = Slots::new(class.instance_slot_count());
        Rc::new(Self {
            class,
            data: RefCell::new(ObjectData::Fields(fields)),
        })
    }

    /// Wrap existing storage, used for arrays.
    pub fn with_data(class: Rc<Class>, data: ObjectData) -> ObjectRef {
        Rc::new(Self {
            class,
            data: RefCell::new(data),
        })
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn data(&self) -> Ref<'_, ObjectData> {
        self.data.borrow()
    }

    pub fn data_mut(&self) -> RefMut<'_, ObjectData> {
        self.data.borrow_mut()
    }

    pub fn is_array(&self) -> bool {
        self.class.is_array()
    }

    pub fn array_length(&self) -> Option<usize> {
        self.data.borrow().array_length()
    }

    pub fn is_instance_of(&self, class: &Rc<Class>) -> bool {
        class.is_assignable_from(&self.class)
    }

    /// Run `f` on the instance fields. Arrays have none.
    pub fn with_fields<T>(&self, f: impl FnOnce(&mut Slots) -> T) -> Option<T> {
        match &mut *self.data.borrow_mut() {
            ObjectData::Fields(fields) => Some(f(fields)),
            _ => None,
        }
    }

    /// Contents of a `java/lang/String`, `None` for anything else.
    pub fn string_value(&self) -> Option<String> {
        if self.class.name() != "java/lang/String" {
            return None;
        }
        let field = self.class.find_field("value", "[C")?;
        let chars = self.with_fields(|fields| fields.get_ref(field.slot_id()))??;
        let data = chars.data();
        match &*data {
            ObjectData::Chars(chars) => Some(String::from_utf16_lossy(chars)),
            _ => None,
        }
    }

    /// Identity hash derived from the allocation address.
    pub fn identity_hash(self: &Rc<Self>) -> i32 {
        let addr = Rc::as_ptr(self) as usize as u64;
        (addr ^ (addr >> 32)) as i32
    }
}

/// Objects compare by identity.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Object({})", self.class.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_storage_by_class_name() {
        assert_eq!(
            ObjectData::new_array("[Z", 2),
            Some(ObjectData::Bytes(vec![0, 0]))
        );
        assert_eq!(ObjectData::new_array("[C", 1), Some(ObjectData::Chars(vec![0])));
        assert_eq!(
            ObjectData::new_array("[[I", 3).and_then(|d| d.array_length()),
            Some(3)
        );
        assert!(matches!(
            ObjectData::new_array("[Ljava/lang/String;", 1),
            Some(ObjectData::Refs(_))
        ));
        assert_eq!(ObjectData::new_array("java/lang/Object", 1), None);
        assert_eq!(ObjectData::Fields(Slots::new(2)).array_length(), None);
    }
}
