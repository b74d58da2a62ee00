//! Runtime representation of a class in the method area.
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::error::{ClassFormatError, Result, VmError};
use crate::heap::constant_pool::{Constant, ConstantPool};
use crate::heap::member::{FieldParts, MethodParts};
use crate::heap::symref::{lookup_field, lookup_method};
use crate::heap::{ClassLoader, Field, Method, Object, ObjectData, ObjectRef};
use crate::jvm::{AccessFlags, JVMClassFile};
use crate::runtime::Slots;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
pub const JAVA_LANG_CLONEABLE: &str = "java/lang/Cloneable";
pub const JAVA_IO_SERIALIZABLE: &str = "java/io/Serializable";

/// Name of the array class whose elements are `component`, which is
/// either a binary class name, an array class name or a primitive
/// descriptor character.
pub fn array_class_name(component: &str) -> String {
    if component.starts_with('[') || is_primitive_descriptor(component) {
        format!("[{component}")
    } else {
        format!("[L{component};")
    }
}

fn is_primitive_descriptor(s: &str) -> bool {
    matches!(s, "Z" | "B" | "C" | "S" | "I" | "J" | "F" | "D")
}

pub struct Class {
    access_flags: AccessFlags,
    name: String,
    super_class_name: Option<String>,
    interface_names: Vec<String>,
    constant_pool: ConstantPool,
    fields: Vec<Rc<Field>>,
    methods: Vec<Rc<Method>>,
    source_file: Option<String>,
    loader: Weak<ClassLoader>,

    super_class: OnceCell<Rc<Class>>,
    interfaces: OnceCell<Vec<Rc<Class>>>,
    /// Element class of reference arrays, loaded on first use.
    component_class: OnceCell<Rc<Class>>,
    instance_slot_count: Cell<usize>,
    static_slot_count: Cell<usize>,
    static_vars: RefCell<Slots>,
    init_started: Cell<bool>,
    linked: Cell<bool>,
}

impl Class {
    /// Build the runtime class from a decoded class file. Super class and
    /// interfaces are attached afterwards by the loader.
    pub(crate) fn from_class_file(
        class_file: &JVMClassFile,
        loader: Weak<ClassLoader>,
    ) -> Result<Rc<Class>> {
        let name = class_file.class_name().ok_or_else(|| {
            VmError::from(ClassFormatError::InvalidIndex {
                index: class_file.this_class,
                message: "this_class is not a Class constant".to_string(),
            })
        })?;
        let super_class_name = match class_file.super_class_name() {
            Some(super_name) => Some(super_name.to_string()),
            None if name == JAVA_LANG_OBJECT => None,
            None => {
                return Err(ClassFormatError::InvalidIndex {
                    index: class_file.super_class,
                    message: format!("{name} has no super class"),
                }
                .into())
            }
        };
        let constants = ConstantPool::build_constants(class_file)?;
        let fields = class_file
            .fields()
            .iter()
            .map(|info| FieldParts::new(class_file, info))
            .collect::<Result<Vec<_>>>()?;
        let methods = class_file
            .methods()
            .iter()
            .map(|info| MethodParts::new(class_file, info))
            .collect::<Result<Vec<_>>>()?;

        Ok(Rc::new_cyclic(|me: &Weak<Class>| Class {
            access_flags: class_file.access_flags(),
            name: name.to_string(),
            super_class_name,
            interface_names: class_file
                .interface_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            constant_pool: ConstantPool::new(me.clone(), constants),
            fields: fields
                .into_iter()
                .map(|parts| Rc::new(Field::new(parts, me.clone())))
                .collect(),
            methods: methods
                .into_iter()
                .map(|parts| Rc::new(Method::new(parts, me.clone())))
                .collect(),
            source_file: class_file.source_file().map(str::to_string),
            loader,
            super_class: OnceCell::new(),
            interfaces: OnceCell::new(),
            component_class: OnceCell::new(),
            instance_slot_count: Cell::new(0),
            static_slot_count: Cell::new(0),
            static_vars: RefCell::new(Slots::default()),
            init_started: Cell::new(false),
            linked: Cell::new(false),
        }))
    }

    /// Synthesize an array class such as `[I` or `[Ljava/lang/String;`.
    pub(crate) fn new_array_class(name: &str, loader: Weak<ClassLoader>) -> Rc<Class> {
        Rc::new_cyclic(|me: &Weak<Class>| Class {
            access_flags: AccessFlags::PUBLIC | AccessFlags::FINAL,
            name: name.to_string(),
            super_class_name: Some(JAVA_LANG_OBJECT.to_string()),
            interface_names: vec![
                JAVA_LANG_CLONEABLE.to_string(),
                JAVA_IO_SERIALIZABLE.to_string(),
            ],
            constant_pool: ConstantPool::new(me.clone(), Vec::new()),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
            loader,
            super_class: OnceCell::new(),
            interfaces: OnceCell::new(),
            component_class: OnceCell::new(),
            instance_slot_count: Cell::new(0),
            static_slot_count: Cell::new(0),
            static_vars: RefCell::new(Slots::default()),
            init_started: Cell::new(true),
            linked: Cell::new(false),
        })
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.super_class_name.as_deref()
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interface_names
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    pub fn fields(&self) -> &[Rc<Field>] {
        &self.fields
    }

    pub fn methods(&self) -> &[Rc<Method>] {
        &self.methods
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn loader(&self) -> Result<Rc<ClassLoader>> {
        self.loader
            .upgrade()
            .ok_or_else(|| VmError::Internal(format!("loader of {} is gone", self.name)))
    }

    /// Resolved super class, `None` for `java/lang/Object` and for classes
    /// still being defined.
    pub fn super_class(&self) -> Option<Rc<Class>> {
        self.super_class.get().cloned()
    }

    pub fn interfaces(&self) -> &[Rc<Class>] {
        self.interfaces.get().map_or(&[], Vec::as_slice)
    }

    pub(crate) fn set_super_class(&self, super_class: Rc<Class>) {
        let _ = self.super_class.set(super_class);
    }

    pub(crate) fn set_interfaces(&self, interfaces: Vec<Rc<Class>>) {
        let _ = self.interfaces.set(interfaces);
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(AccessFlags::PUBLIC)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(AccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(AccessFlags::ABSTRACT)
    }

    pub fn is_super(&self) -> bool {
        self.access_flags.contains(AccessFlags::SUPER)
    }

    pub fn is_array(&self) -> bool {
        self.name.starts_with('[')
    }

    pub fn is_java_lang_object(&self) -> bool {
        self.name == JAVA_LANG_OBJECT
    }

    pub fn instance_slot_count(&self) -> usize {
        self.instance_slot_count.get()
    }

    pub fn static_slot_count(&self) -> usize {
        self.static_slot_count.get()
    }

    pub fn static_vars(&self) -> Ref<'_, Slots> {
        self.static_vars.borrow()
    }

    pub fn static_vars_mut(&self) -> RefMut<'_, Slots> {
        self.static_vars.borrow_mut()
    }

    pub fn init_started(&self) -> bool {
        self.init_started.get()
    }

    pub fn start_init(&self) {
        self.init_started.set(true);
    }

    pub fn is_linked(&self) -> bool {
        self.linked.get()
    }

    /// Method declared by this class itself.
    pub fn get_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        self.methods
            .iter()
            .find(|m| m.name() == name && m.descriptor() == descriptor)
            .cloned()
    }

    pub fn get_static_method(&self, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        self.get_method(name, descriptor).filter(|m| m.is_static())
    }

    /// Method declared by this class or inherited from a super class.
    pub fn find_method(self: &Rc<Self>, name: &str, descriptor: &str) -> Option<Rc<Method>> {
        lookup_method(self, name, descriptor)
    }

    /// Field declared by this class, its super-interfaces or super classes.
    pub fn find_field(self: &Rc<Self>, name: &str, descriptor: &str) -> Option<Rc<Field>> {
        lookup_field(self, name, descriptor)
    }

    pub fn clinit(&self) -> Option<Rc<Method>> {
        self.get_static_method("<clinit>", "()V")
    }

    pub fn main_method(&self) -> Option<Rc<Method>> {
        self.get_static_method("main", "([Ljava/lang/String;)V")
    }

    /// Allocate an instance with zeroed fields.
    pub fn new_object(self: &Rc<Self>) -> ObjectRef {
        Object::new(self.clone())
    }

    /// Allocate a zeroed array of this array class.
    pub fn new_array(self: &Rc<Self>, len: usize) -> Result<ObjectRef> {
        let data = ObjectData::new_array(&self.name, len)
            .ok_or_else(|| VmError::Internal(format!("{} is not an array class", self.name)))?;
        Ok(Object::with_data(self.clone(), data))
    }

    /// Component of an array class: a binary class name, an array class
    /// name or a primitive descriptor character.
    pub fn component_name(&self) -> Option<&str> {
        let component = self.name.strip_prefix('[')?;
        match component.strip_prefix('L') {
            Some(class_name) => class_name.strip_suffix(';'),
            None => Some(component),
        }
    }

    /// Component class of a reference array, `None` for primitive arrays
    /// and non-array classes.
    pub fn component_class(&self) -> Result<Option<Rc<Class>>> {
        match self.component_name() {
            Some(component) if !is_primitive_descriptor(component) => self
                .component_class
                .get_or_try_init(|| self.loader()?.load_class(component))
                .map(|class| Some(class.clone())),
            _ => Ok(None),
        }
    }

    /// Name of the array class with this class as component.
    pub fn array_class_name(&self) -> String {
        array_class_name(&self.name)
    }

    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = self.super_class();
        while let Some(class) = current {
            if std::ptr::eq(class.as_ref(), other) {
                return true;
            }
            current = class.super_class();
        }
        false
    }

    /// Whether this class or one of its super classes implements
    /// `interface`, directly or through a super-interface.
    pub fn is_implementing(&self, interface: &Class) -> bool {
        let implements = |class: &Class| {
            class
                .interfaces()
                .iter()
                .any(|i| std::ptr::eq(i.as_ref(), interface) || i.is_sub_interface_of(interface))
        };
        if implements(self) {
            return true;
        }
        let mut current = self.super_class();
        while let Some(class) = current {
            if implements(class.as_ref()) {
                return true;
            }
            current = class.super_class();
        }
        false
    }

    pub fn is_sub_interface_of(&self, interface: &Class) -> bool {
        self.interfaces()
            .iter()
            .any(|i| std::ptr::eq(i.as_ref(), interface) || i.is_sub_interface_of(interface))
    }

    /// Whether a value of class `other` can be stored in a variable of
    /// this class, following the `checkcast` rules of JVMS §6.5.
    pub fn is_assignable_from(&self, other: &Class) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if !other.is_array() {
            return match (other.is_interface(), self.is_interface()) {
                (false, false) => other.is_subclass_of(self),
                (false, true) => other.is_implementing(self),
                (true, true) => other.is_sub_interface_of(self),
                (true, false) => self.is_java_lang_object(),
            };
        }
        if !self.is_array() {
            return if self.is_interface() {
                self.name == JAVA_LANG_CLONEABLE || self.name == JAVA_IO_SERIALIZABLE
            } else {
                self.is_java_lang_object()
            };
        }
        match (self.component_class(), other.component_class()) {
            (Ok(Some(target)), Ok(Some(source))) => target.is_assignable_from(&source),
            (Ok(None), Ok(None)) => self.name == other.name,
            _ => false,
        }
    }

    /// Lay out fields and allocate static storage. Instance fields come
    /// after the super class's; `long` and `double` take two slots.
    pub(crate) fn link(&self) -> Result<()> {
        let mut instance_slots = self
            .super_class()
            .map_or(0, |super_class| super_class.instance_slot_count());
        let mut static_slots = 0;
        for field in &self.fields {
            let width = if field.is_wide() { 2 } else { 1 };
            if field.is_static() {
                field.set_slot_id(static_slots);
                static_slots += width;
            } else {
                field.set_slot_id(instance_slots);
                instance_slots += width;
            }
        }
        self.instance_slot_count.set(instance_slots);
        self.static_slot_count.set(static_slots);
        *self.static_vars.borrow_mut() = Slots::new(static_slots);
        self.init_static_final_vars()?;
        self.linked.set(true);
        debug!(
            class = %self.name,
            instance_slots,
            static_slots,
            "linked class"
        );
        Ok(())
    }

    fn init_static_final_vars(&self) -> Result<()> {
        for field in self.fields.iter().filter(|f| f.is_static() && f.is_final()) {
            let Some(index) = field.constant_value_index() else {
                continue;
            };
            let slot_id = field.slot_id();
            match self.constant_pool.get(index)? {
                Constant::Integer(v) => self.static_vars_mut().set_int(slot_id, *v),
                Constant::Float(v) => self.static_vars_mut().set_float(slot_id, *v),
                Constant::Long(v) => self.static_vars_mut().set_long(slot_id, *v),
                Constant::Double(v) => self.static_vars_mut().set_double(slot_id, *v),
                Constant::String(s) => {
                    let string = self.loader()?.intern_string(s)?;
                    self.static_vars_mut().set_ref(slot_id, Some(string));
                }
                _ => {
                    return Err(ClassFormatError::MalformedAttribute {
                        name: "ConstantValue".to_string(),
                        message: format!("field {} points at a non-constant entry", field.name()),
                    }
                    .into())
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Class({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_class_names() {
        assert_eq!(array_class_name("I"), "[I");
        assert_eq!(array_class_name("[I"), "[[I");
        assert_eq!(array_class_name("java/lang/String"), "[Ljava/lang/String;");
        // A one-letter class in the default package is still a class.
        assert_eq!(array_class_name("A"), "[LA;");
    }
}
