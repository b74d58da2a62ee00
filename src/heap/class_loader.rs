//! The class loader: finds, defines and links classes.
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::descriptor::Type;
use crate::error::{exceptions, Result, VmError};
use crate::heap::bootstrap;
use crate::heap::class::{JAVA_IO_SERIALIZABLE, JAVA_LANG_CLONEABLE, JAVA_LANG_OBJECT};
use crate::heap::{Class, Object, ObjectData, ObjectRef};
use crate::jvm::{read_class_file, JVMClassFile, JVMParser, JavaStr};

pub const JAVA_LANG_STRING: &str = "java/lang/String";

/// Loads classes from a single classpath directory. Classes are never
/// unloaded; the loader owns them for the lifetime of the VM.
pub struct ClassLoader {
    classpath: PathBuf,
    classes: RefCell<HashMap<String, Rc<Class>>>,
    interned: RefCell<HashMap<Vec<u16>, ObjectRef>>,
    me: Weak<ClassLoader>,
}

impl ClassLoader {
    pub fn new(classpath: impl Into<PathBuf>) -> Rc<Self> {
        let classpath = classpath.into();
        Rc::new_cyclic(|me| Self {
            classpath,
            classes: RefCell::new(HashMap::new()),
            interned: RefCell::new(HashMap::new()),
            me: me.clone(),
        })
    }

    pub fn classpath(&self) -> &Path {
        &self.classpath
    }

    /// Whether `name` has been defined, or is being defined.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.classes.borrow().contains_key(name)
    }

    pub fn loaded_class_count(&self) -> usize {
        self.classes.borrow().len()
    }

    /// Find and define the class with binary name `name`.
    ///
    /// Lookup order: already defined classes, array classes, the
    /// classpath, the current directory, then the built-in bootstrap
    /// classes.
    pub fn load_class(&self, name: &str) -> Result<Rc<Class>> {
        let loaded = self.classes.borrow().get(name).cloned();
        if let Some(class) = loaded {
            return Ok(class);
        }
        if name.starts_with('[') {
            return self.load_array_class(name);
        }
        if let Some(data) = self.read_class(name)? {
            return self.define_class(&data);
        }
        if let Some(class_file) = bootstrap::class_file(name) {
            debug!(class = name, "defining bootstrap class");
            return self.define(&class_file);
        }
        Err(VmError::exception(exceptions::CLASS_NOT_FOUND_EXCEPTION, name))
    }

    fn read_class(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut relative: PathBuf = name.split('/').collect();
        relative.set_extension("class");
        for root in [self.classpath.as_path(), Path::new(".")] {
            let path = root.join(&relative);
            if path.is_file() {
                trace!(path = %path.display(), "reading class file");
                return Ok(Some(read_class_file(&path)?));
            }
        }
        Ok(None)
    }

    /// Decode `data` and define the class it holds.
    pub fn define_class(&self, data: &[u8]) -> Result<Rc<Class>> {
        let class_file = JVMParser::parse(data)?;
        self.define(&class_file)
    }

    /// Define a decoded class. The class enters the class map before its
    /// super class and interfaces are loaded, so a class reaching itself
    /// through its own super class chain is detected and reported as a
    /// `ClassCircularityError`. A class that fails to define or link is
    /// taken out of the map again.
    pub fn define(&self, class_file: &JVMClassFile) -> Result<Rc<Class>> {
        let class = Class::from_class_file(class_file, self.me.clone())?;
        let name = class.name().to_string();
        if self.is_loaded(&name) {
            return Err(VmError::exception(
                exceptions::LINKAGE_ERROR,
                format!("duplicate class definition: {name}"),
            ));
        }
        self.classes.borrow_mut().insert(name.clone(), class.clone());

        let linked = self
            .resolve_super_class(&class)
            .and_then(|_| self.resolve_interfaces(&class))
            .and_then(|_| class.link());
        match linked {
            Ok(()) => {
                debug!(class = %name, "defined class");
                Ok(class)
            }
            Err(err) => {
                self.classes.borrow_mut().remove(&name);
                Err(err)
            }
        }
    }

    fn load_linked(&self, class: &Class, name: &str) -> Result<Rc<Class>> {
        let loaded = self.load_class(name)?;
        if !loaded.is_linked() {
            return Err(VmError::exception(
                exceptions::CLASS_CIRCULARITY_ERROR,
                format!("{} reaches itself through {}", class.name(), name),
            ));
        }
        Ok(loaded)
    }

    fn resolve_super_class(&self, class: &Rc<Class>) -> Result<()> {
        let Some(super_name) = class.super_class_name() else {
            return Ok(());
        };
        let super_class = self.load_linked(class, super_name)?;
        if super_class.is_interface() {
            return Err(VmError::exception(
                exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR,
                format!("{} has interface {} as super class", class.name(), super_name),
            ));
        }
        class.set_super_class(super_class);
        Ok(())
    }

    fn resolve_interfaces(&self, class: &Rc<Class>) -> Result<()> {
        let interfaces = class
            .interface_names()
            .iter()
            .map(|name| {
                let interface = self.load_linked(class, name)?;
                if !interface.is_interface() {
                    return Err(VmError::exception(
                        exceptions::INCOMPATIBLE_CLASS_CHANGE_ERROR,
                        format!("{} implements non-interface {}", class.name(), name),
                    ));
                }
                Ok(interface)
            })
            .collect::<Result<Vec<_>>>()?;
        class.set_interfaces(interfaces);
        Ok(())
    }

    fn load_array_class(&self, name: &str) -> Result<Rc<Class>> {
        if Type::parse(name).is_none() {
            return Err(VmError::exception(exceptions::CLASS_NOT_FOUND_EXCEPTION, name));
        }
        let class = Class::new_array_class(name, self.me.clone());
        class.set_super_class(self.load_class(JAVA_LANG_OBJECT)?);
        class.set_interfaces(vec![
            self.load_class(JAVA_LANG_CLONEABLE)?,
            self.load_class(JAVA_IO_SERIALIZABLE)?,
        ]);
        class.link()?;
        self.classes
            .borrow_mut()
            .insert(name.to_string(), class.clone());
        debug!(class = name, "defined array class");
        Ok(class)
    }

    /// Allocate a `java/lang/String` holding `value`.
    pub fn new_string(&self, value: &str) -> Result<ObjectRef> {
        self.new_string_from_units(value.encode_utf16().collect())
    }

    /// Allocate a `java/lang/String` over raw UTF-16 code units.
    pub fn new_string_from_units(&self, units: Vec<u16>) -> Result<ObjectRef> {
        let string_class = self.load_class(JAVA_LANG_STRING)?;
        let chars_class = self.load_class("[C")?;
        let value_field = string_class.find_field("value", "[C").ok_or_else(|| {
            VmError::exception(exceptions::NO_SUCH_FIELD_ERROR, "java/lang/String.value:[C")
        })?;
        let chars = Object::with_data(chars_class, ObjectData::Chars(units));
        let string = string_class.new_object();
        string.with_fields(|fields| fields.set_ref(value_field.slot_id(), Some(chars)));
        Ok(string)
    }

    /// The canonical string object for a literal. Every `ldc` of the same
    /// text yields the same reference.
    pub fn intern_string(&self, value: &JavaStr) -> Result<ObjectRef> {
        let interned = self.interned.borrow().get(value.units()).cloned();
        if let Some(string) = interned {
            return Ok(string);
        }
        let string = self.new_string_from_units(value.units().to_vec())?;
        self.interned
            .borrow_mut()
            .insert(value.units().to_vec(), string.clone());
        Ok(string)
    }
}

impl std::fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ClassLoader")
            .field("classpath", &self.classpath)
            .field("classes", &self.classes.borrow().len())
            .finish()
    }
}
