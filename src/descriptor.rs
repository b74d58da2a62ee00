//! Field and method descriptors.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static METHOD_DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([^\)]*)\)(.+)$").expect("valid method descriptor regex"));

/// Value kinds a descriptor can name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseTypeKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// A class or interface, by binary name.
    Object(String),
    /// An array, the component type is in `sub_t`.
    List,
}

/// JVM value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub t: BaseTypeKind,
    pub sub_t: Option<Box<Type>>,
}

impl Type {
    pub fn new(t: BaseTypeKind) -> Self {
        Self { t, sub_t: None }
    }

    pub fn array_of(component: Type) -> Self {
        Self {
            t: BaseTypeKind::List,
            sub_t: Some(Box::new(component)),
        }
    }

    /// Returns the size in slots of a given type.
    pub fn size(&self) -> usize {
        match self.t {
            BaseTypeKind::Long | BaseTypeKind::Double => 2,
            BaseTypeKind::Void => 0,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.t, BaseTypeKind::Object(_) | BaseTypeKind::List)
    }

    /// Decode one field type from the start of `s`, returning it with the
    /// number of bytes it spans.
    pub fn decode(s: &str) -> Option<(Type, usize)> {
        let first = s.as_bytes().first()?;
        let simple = |t| Some((Type::new(t), 1));
        match first {
            b'Z' => simple(BaseTypeKind::Boolean),
            b'B' => simple(BaseTypeKind::Byte),
            b'C' => simple(BaseTypeKind::Char),
            b'S' => simple(BaseTypeKind::Short),
            b'I' => simple(BaseTypeKind::Int),
            b'J' => simple(BaseTypeKind::Long),
            b'F' => simple(BaseTypeKind::Float),
            b'D' => simple(BaseTypeKind::Double),
            b'V' => simple(BaseTypeKind::Void),
            b'L' => {
                let end = s.find(';')?;
                if end < 2 {
                    return None;
                }
                Some((Type::new(BaseTypeKind::Object(s[1..end].to_string())), end + 1))
            }
            b'[' => {
                let (component, len) = Type::decode(&s[1..])?;
                if component.t == BaseTypeKind::Void {
                    return None;
                }
                Some((Type::array_of(component), len + 1))
            }
            _ => None,
        }
    }

    /// Parse a complete field descriptor such as `[Ljava/lang/String;`.
    pub fn parse(s: &str) -> Option<Type> {
        match Type::decode(s)? {
            (t, len) if len == s.len() && t.t != BaseTypeKind::Void => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.t {
            BaseTypeKind::Boolean => write!(f, "Z"),
            BaseTypeKind::Byte => write!(f, "B"),
            BaseTypeKind::Char => write!(f, "C"),
            BaseTypeKind::Short => write!(f, "S"),
            BaseTypeKind::Int => write!(f, "I"),
            BaseTypeKind::Long => write!(f, "J"),
            BaseTypeKind::Float => write!(f, "F"),
            BaseTypeKind::Double => write!(f, "D"),
            BaseTypeKind::Void => write!(f, "V"),
            BaseTypeKind::Object(name) => write!(f, "L{name};"),
            BaseTypeKind::List => match &self.sub_t {
                Some(component) => write!(f, "[{component}"),
                None => write!(f, "["),
            },
        }
    }
}

/// Parsed method descriptor, e.g. `(IJ[Ljava/lang/String;)V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub arg_types: Vec<Type>,
    pub return_type: Type,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Option<Self> {
        let caps = METHOD_DESCRIPTOR.captures(descriptor)?;
        let mut args = caps.get(1).map_or("", |m| m.as_str());
        let return_type = match Type::decode(caps.get(2)?.as_str())? {
            (t, len) if len == caps.get(2)?.as_str().len() => t,
            _ => return None,
        };

        let mut arg_types = Vec::new();
        while !args.is_empty() {
            let (t, len) = Type::decode(args)?;
            if t.t == BaseTypeKind::Void {
                return None;
            }
            arg_types.push(t);
            args = &args[len..];
        }
        Some(Self {
            arg_types,
            return_type,
        })
    }

    /// Number of local variable slots the arguments take, excluding `this`.
    pub fn arg_slot_count(&self) -> usize {
        self.arg_types.iter().map(Type::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_descriptors() {
        let desc = MethodDescriptor::parse("(IJ[Ljava/lang/String;D[[B)V").unwrap();
        assert_eq!(desc.arg_types.len(), 5);
        assert_eq!(desc.arg_slot_count(), 1 + 2 + 1 + 2 + 1);
        assert_eq!(desc.return_type, Type::new(BaseTypeKind::Void));
        assert_eq!(
            desc.arg_types[2],
            Type::array_of(Type::new(BaseTypeKind::Object("java/lang/String".to_string())))
        );
        assert_eq!(desc.arg_types[4].to_string(), "[[B");

        let desc = MethodDescriptor::parse("()J").unwrap();
        assert!(desc.arg_types.is_empty());
        assert_eq!(desc.return_type.size(), 2);
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for bad in ["", "I", "(V)V", "(I", "(Q)V", "(L;)V", "()", "()II", "([V)V"] {
            assert_eq!(MethodDescriptor::parse(bad), None, "{bad}");
        }
    }

    #[test]
    fn parses_field_types() {
        assert_eq!(Type::parse("I"), Some(Type::new(BaseTypeKind::Int)));
        assert_eq!(Type::parse("V"), None);
        assert_eq!(Type::parse("II"), None);
        let t = Type::parse("[Ljava/lang/Object;").unwrap();
        assert!(t.is_reference());
        assert_eq!(t.to_string(), "[Ljava/lang/Object;");
    }
}
