//! Error types for the virtual machine.
//!
//! Structural problems with a class file are reported as
//! [`ClassFormatError`]. Everything that can go wrong after a class was
//! decoded is a [`VmError`]; linkage and runtime failures carry the binary
//! name of the Java exception class that describes them so the interpreter
//! can turn them into throwable objects and search for a handler.

use crate::heap::ObjectRef;
use thiserror::Error;

/// Binary names of the exceptions raised by the virtual machine itself.
pub mod exceptions {
    pub const ARITHMETIC_EXCEPTION: &str = "java/lang/ArithmeticException";
    pub const ARRAY_INDEX_OUT_OF_BOUNDS: &str = "java/lang/ArrayIndexOutOfBoundsException";
    pub const ARRAY_STORE_EXCEPTION: &str = "java/lang/ArrayStoreException";
    pub const CLASS_CAST_EXCEPTION: &str = "java/lang/ClassCastException";
    pub const CLASS_CIRCULARITY_ERROR: &str = "java/lang/ClassCircularityError";
    pub const CLASS_NOT_FOUND_EXCEPTION: &str = "java/lang/ClassNotFoundException";
    pub const INCOMPATIBLE_CLASS_CHANGE_ERROR: &str = "java/lang/IncompatibleClassChangeError";
    pub const INSTANTIATION_ERROR: &str = "java/lang/InstantiationError";
    pub const LINKAGE_ERROR: &str = "java/lang/LinkageError";
    pub const NEGATIVE_ARRAY_SIZE: &str = "java/lang/NegativeArraySizeException";
    pub const NO_SUCH_FIELD_ERROR: &str = "java/lang/NoSuchFieldError";
    pub const NO_SUCH_METHOD_ERROR: &str = "java/lang/NoSuchMethodError";
    pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
    pub const STACK_OVERFLOW_ERROR: &str = "java/lang/StackOverflowError";
    pub const STACK_UNDERFLOW_ERROR: &str = "java/lang/StackUnderflowError";
    pub const UNSATISFIED_LINK_ERROR: &str = "java/lang/UnsatisfiedLinkError";
    pub const ABSTRACT_METHOD_ERROR: &str = "java/lang/AbstractMethodError";
}

/// Structural error found while decoding a class file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFormatError {
    /// The first four bytes are not `0xCAFEBABE`.
    #[error("Invalid magic: expected CAFEBABE, got {actual:08X}")]
    InvalidMagic { actual: u32 },

    /// Major version outside of the supported 45..=53 range.
    #[error("Unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// Constant pool tag that is either unknown or not implemented.
    #[error("Unsupported constant pool tag {tag} at index {index}")]
    UnsupportedTag { tag: u8, index: u16 },

    /// Constant pool index out of range or pointing at the wrong kind of entry.
    #[error("Invalid constant pool index {index}: {message}")]
    InvalidIndex { index: u16, message: String },

    /// The input ended before the structure was complete.
    #[error("Truncated class file at offset {offset}")]
    Truncated { offset: u64 },

    /// Bytes left over after the last class attribute.
    #[error("Trailing {count} bytes after class file")]
    TrailingBytes { count: usize },

    /// An attribute whose declared length disagrees with its contents.
    #[error("Malformed {name} attribute: {message}")]
    MalformedAttribute { name: String, message: String },

    /// A modified UTF-8 string that cannot be decoded.
    #[error("Invalid modified UTF-8 at constant pool index {index}")]
    InvalidUtf8 { index: u16 },
}

/// Primary error type for class loading and execution.
#[derive(Debug, Error)]
pub enum VmError {
    /// The class file is structurally broken.
    #[error("Class format error: {0}")]
    ClassFormat(#[from] ClassFormatError),

    /// A linkage or runtime failure described by a Java exception class.
    #[error("{class_name}: {message}")]
    Exception { class_name: String, message: String },

    /// A Java throwable object in flight, looking for a handler.
    #[error("thrown {}", .0.class().name())]
    Thrown(ObjectRef),

    /// A throwable reached the bottom of the frame stack.
    #[error("Uncaught exception {class_name}: {message}")]
    Uncaught { class_name: String, message: String },

    /// The byte at `pc` is not an opcode the interpreter knows.
    #[error("Unknown opcode 0x{opcode:02X} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    /// A feature outside of what this virtual machine implements.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A broken internal invariant, e.g. a member whose class is gone.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error while reading class files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VmError {
    /// Build a VM-raised exception from its binary class name.
    pub fn exception(class_name: &str, message: impl Into<String>) -> Self {
        VmError::Exception {
            class_name: class_name.to_string(),
            message: message.into(),
        }
    }

    /// Returns the Java class name if this error names one.
    pub fn exception_class(&self) -> Option<&str> {
        match self {
            VmError::Exception { class_name, .. } | VmError::Uncaught { class_name, .. } => {
                Some(class_name)
            }
            _ => None,
        }
    }
}

/// Result type alias for virtual machine operations.
pub type Result<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClassFormatError::InvalidMagic { actual: 0xDEADBEEF };
        assert!(err.to_string().contains("DEADBEEF"));

        let err = ClassFormatError::UnsupportedVersion { major: 61, minor: 0 };
        assert!(err.to_string().contains("61.0"));
    }

    #[test]
    fn test_exception_class() {
        let err = VmError::exception(exceptions::NULL_POINTER_EXCEPTION, "array is null");
        assert_eq!(err.exception_class(), Some("java/lang/NullPointerException"));
        assert!(err.to_string().contains("array is null"));

        let err = VmError::Unsupported("invokedynamic".to_string());
        assert_eq!(err.exception_class(), None);
    }
}
