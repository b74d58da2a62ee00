//! Symbolic references and their lazy resolution.
//!
//! A reference is resolved the first time an instruction needs it; the
//! result is cached in a once-cell and never replaced.
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::error::{exceptions, Result, VmError};
use crate::heap::{Class, ConstantPool, Field, Method};

/// Reference to a class by binary name.
#[derive(Debug)]
pub struct ClassRef {
    class_name: String,
    class: OnceCell<Rc<Class>>,
}

impl ClassRef {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            class: OnceCell::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_resolved(&self) -> bool {
        self.class.get().is_some()
    }

    /// Resolve through the loader of the class owning `pool`.
    pub fn resolved_class(&self, pool: &ConstantPool) -> Result<Rc<Class>> {
        self.class
            .get_or_try_init(|| {
                let owner = pool.class()?;
                let loader = owner.loader()?;
                trace!(from = owner.name(), to = %self.class_name, "resolving class");
                loader.load_class(&self.class_name)
            })
            .cloned()
    }
}

/// Reference to a field or method: owner class, simple name and
/// descriptor, plus the cached target.
#[derive(Debug)]
pub struct MemberRef<T> {
    class_ref: ClassRef,
    name: String,
    descriptor: String,
    resolved: OnceCell<Rc<T>>,
}

pub type FieldRef = MemberRef<Field>;
pub type MethodRef = MemberRef<Method>;

impl<T> MemberRef<T> {
    pub fn new(class_name: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            class_ref: ClassRef::new(class_name),
            name: name.into(),
            descriptor: descriptor.into(),
            resolved: OnceCell::new(),
        }
    }

    pub fn class_ref(&self) -> &ClassRef {
        &self.class_ref
    }

    pub fn class_name(&self) -> &str {
        self.class_ref.class_name()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn describe(&self) -> String {
        format!("{}.{}:{}", self.class_name(), self.name, self.descriptor)
    }
}

impl FieldRef {
    /// Field resolution, JVMS §5.4.3.2.
    pub fn resolved_field(&self, pool: &ConstantPool) -> Result<Rc<Field>> {
        self.resolved
            .get_or_try_init(|| {
                let class = self.class_ref.resolved_class(pool)?;
                lookup_field(&class, &self.name, &self.descriptor).ok_or_else(|| {
                    VmError::exception(exceptions::NO_SUCH_FIELD_ERROR, self.describe())
                })
            })
            .cloned()
    }
}

impl MethodRef {
    /// Class method resolution, JVMS §5.4.3.3.
    pub fn resolved_method(&self, pool: &ConstantPool) -> Result<Rc<Method>> {
        self.resolved
            .get_or_try_init(|| {
                let class = self.class_ref.resolved_class(pool)?;
                if class.is_interface() {
                    return Err(VmError::exception(
                        exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR,
                        format!("{} is an interface", class.name()),
                    ));
                }
                lookup_method(&class, &self.name, &self.descriptor)
                    .or_else(|| lookup_method_in_interfaces(class.interfaces(), &self.name, &self.descriptor))
                    .ok_or_else(|| {
                        VmError::exception(exceptions::NO_SUCH_METHOD_ERROR, self.describe())
                    })
            })
            .cloned()
    }

    /// Interface method resolution, JVMS §5.4.3.4.
    pub fn resolved_interface_method(&self, pool: &ConstantPool) -> Result<Rc<Method>> {
        self.resolved
            .get_or_try_init(|| {
                let class = self.class_ref.resolved_class(pool)?;
                if !class.is_interface() {
                    return Err(VmError::exception(
                        exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR,
                        format!("{} is not an interface", class.name()),
                    ));
                }
                class
                    .get_method(&self.name, &self.descriptor)
                    .or_else(|| lookup_method_in_interfaces(class.interfaces(), &self.name, &self.descriptor))
                    // Interfaces inherit the public methods of Object.
                    .or_else(|| {
                        class
                            .super_class()
                            .and_then(|object| object.get_method(&self.name, &self.descriptor))
                    })
                    .ok_or_else(|| {
                        VmError::exception(exceptions::NO_SUCH_METHOD_ERROR, self.describe())
                    })
            })
            .cloned()
    }
}

/// Search `class`, its super-interfaces, then its super-classes.
pub fn lookup_field(class: &Rc<Class>, name: &str, descriptor: &str) -> Option<Rc<Field>> {
    if let Some(field) = class
        .fields()
        .iter()
        .find(|f| f.name() == name && f.descriptor() == descriptor)
    {
        return Some(field.clone());
    }
    for interface in class.interfaces() {
        if let Some(field) = lookup_field(interface, name, descriptor) {
            return Some(field);
        }
    }
    class
        .super_class()
        .and_then(|super_class| lookup_field(&super_class, name, descriptor))
}

/// Search `class` and its super-class chain.
pub fn lookup_method(class: &Rc<Class>, name: &str, descriptor: &str) -> Option<Rc<Method>> {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(method) = c.get_method(name, descriptor) {
            return Some(method);
        }
        current = c.super_class();
    }
    None
}

/// Search interfaces and their super-interfaces, depth first.
pub fn lookup_method_in_interfaces(
    interfaces: &[Rc<Class>],
    name: &str,
    descriptor: &str,
) -> Option<Rc<Method>> {
    for interface in interfaces {
        if let Some(method) = interface.get_method(name, descriptor) {
            return Some(method);
        }
        if let Some(method) = lookup_method_in_interfaces(interface.interfaces(), name, descriptor) {
            return Some(method);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::ClassLoader;
    use crate::jvm::builder::ClassFileBuilder;
    use crate::jvm::AccessFlags;
    use pretty_assertions::assert_eq;

    const OBJECT: &str = "java/lang/Object";

    struct Fixture {
        _loader: Rc<ClassLoader>,
        class: Rc<Class>,
        this_class: u16,
        count: u16,
        missing_field: u16,
        twice: u16,
        hash_code: u16,
        missing_method: u16,
        interface_as_class: u16,
        class_as_interface: u16,
    }

    fn fixture() -> Fixture {
        let loader = ClassLoader::new("/nonexistent-classpath");
        let mut shape = ClassFileBuilder::new("Shape", Some(OBJECT));
        shape
            .set_access_flags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
            .add_bodiless_method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, "area", "()I");
        loader.define(&shape.build()).unwrap();

        let mut refs = ClassFileBuilder::new("Refs", Some(OBJECT));
        refs.add_field(AccessFlags::STATIC, "count", "I");
        refs.add_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "twice",
            "(I)I",
            2,
            1,
            vec![0x1a, 0x05, 0x68, 0xac],
        );
        let this_class = refs.class("Refs");
        let count = refs.field_ref("Refs", "count", "I");
        let missing_field = refs.field_ref("Refs", "total", "J");
        let twice = refs.method_ref("Refs", "twice", "(I)I");
        let hash_code = refs.method_ref("Refs", "hashCode", "()I");
        let missing_method = refs.method_ref("Refs", "thrice", "(I)I");
        let interface_as_class = refs.method_ref("Shape", "area", "()I");
        let class_as_interface = refs.interface_method_ref("Refs", "twice", "(I)I");
        let class = loader.define(&refs.build()).unwrap();
        Fixture {
            _loader: loader,
            class,
            this_class,
            count,
            missing_field,
            twice,
            hash_code,
            missing_method,
            interface_as_class,
            class_as_interface,
        }
    }

    #[test]
    fn resolution_is_cached() {
        let f = fixture();
        let pool = f.class.constant_pool();

        let class_ref = pool.class_ref(f.this_class).unwrap();
        assert!(!class_ref.is_resolved());
        let class = class_ref.resolved_class(pool).unwrap();
        assert!(class_ref.is_resolved());
        assert!(Rc::ptr_eq(&class, &f.class));
        assert!(Rc::ptr_eq(&class_ref.resolved_class(pool).unwrap(), &class));

        let field_ref = pool.field_ref(f.count).unwrap();
        assert!(!field_ref.is_resolved());
        let field = pool.resolve_field(f.count).unwrap();
        assert!(field_ref.is_resolved());
        assert!(Rc::ptr_eq(&pool.resolve_field(f.count).unwrap(), &field));
        assert_eq!(field.name(), "count");

        let (method_ref, is_interface) = pool.method_ref(f.twice).unwrap();
        assert!(!is_interface);
        assert!(!method_ref.is_resolved());
        let method = pool.resolve_method(f.twice).unwrap();
        assert!(method_ref.is_resolved());
        assert!(Rc::ptr_eq(&pool.resolve_method(f.twice).unwrap(), &method));
    }

    #[test]
    fn methods_resolve_through_super_classes() {
        let f = fixture();
        let method = f.class.constant_pool().resolve_method(f.hash_code).unwrap();
        assert_eq!(method.class().unwrap().name(), OBJECT);
    }

    #[test]
    fn missing_members() {
        let f = fixture();
        let pool = f.class.constant_pool();

        let err = pool.resolve_field(f.missing_field).unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::NO_SUCH_FIELD_ERROR));
        assert!(!pool.field_ref(f.missing_field).unwrap().is_resolved());

        let err = pool.resolve_method(f.missing_method).unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::NO_SUCH_METHOD_ERROR));
        assert!(!pool.method_ref(f.missing_method).unwrap().0.is_resolved());
    }

    #[test]
    fn method_ref_kind_must_match_the_class() {
        let f = fixture();
        let pool = f.class.constant_pool();

        let err = pool.resolve_method(f.interface_as_class).unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR));

        assert!(pool.method_ref(f.class_as_interface).unwrap().1);
        let err = pool.resolve_method(f.class_as_interface).unwrap_err();
        assert_eq!(err.exception_class(), Some(exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR));
    }
}
