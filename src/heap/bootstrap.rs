//! Built-in class files for the core library classes the interpreter
//! depends on. They are only used when the classpath does not provide
//! the class.
use crate::jvm::builder::ClassFileBuilder;
use crate::jvm::{AccessFlags, JVMClassFile};

const OBJECT: &str = "java/lang/Object";
const STRING: &str = "java/lang/String";
const THROWABLE: &str = "java/lang/Throwable";

// Opcodes used by the synthesized method bodies.
const ICONST_0: u8 = 0x03;
const ICONST_1: u8 = 0x04;
const ILOAD_1: u8 = 0x1b;
const ALOAD_0: u8 = 0x2a;
const ALOAD_1: u8 = 0x2b;
const CALOAD: u8 = 0x34;
const DUP: u8 = 0x59;
const IF_ACMPNE: u8 = 0xa6;
const IRETURN: u8 = 0xac;
const ARETURN: u8 = 0xb0;
const RETURN: u8 = 0xb1;
const GETFIELD: u8 = 0xb4;
const PUTFIELD: u8 = 0xb5;
const INVOKESPECIAL: u8 = 0xb7;
const INVOKESTATIC: u8 = 0xb8;
const ARRAYLENGTH: u8 = 0xbe;

/// Throwable classes and their super classes, parents before children.
const THROWABLES: &[(&str, &str)] = &[
    ("java/lang/Exception", THROWABLE),
    ("java/lang/Error", THROWABLE),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    (
        "java/lang/ArrayIndexOutOfBoundsException",
        "java/lang/IndexOutOfBoundsException",
    ),
    ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/ReflectiveOperationException", "java/lang/Exception"),
    (
        "java/lang/ClassNotFoundException",
        "java/lang/ReflectiveOperationException",
    ),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/ClassCircularityError", "java/lang/LinkageError"),
    ("java/lang/UnsatisfiedLinkError", "java/lang/LinkageError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/InstantiationError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/AbstractMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    ("java/lang/StackOverflowError", "java/lang/VirtualMachineError"),
    ("java/lang/StackUnderflowError", "java/lang/VirtualMachineError"),
];

fn u2(index: u16) -> [u8; 2] {
    index.to_be_bytes()
}

/// Class file of the built-in class called `name`, if there is one.
pub fn class_file(name: &str) -> Option<JVMClassFile> {
    let class_file = match name {
        OBJECT => object(),
        STRING => string(),
        THROWABLE => throwable(),
        "java/lang/Cloneable" | "java/io/Serializable" => marker_interface(name),
        "java/lang/System" => system(),
        "java/lang/Float" => boxed_bits("java/lang/Float", "floatToRawIntBits", "(F)I", "intBitsToFloat", "(I)F"),
        "java/lang/Double" => boxed_bits(
            "java/lang/Double",
            "doubleToRawLongBits",
            "(D)J",
            "longBitsToDouble",
            "(J)D",
        ),
        _ => {
            let (_, super_name) = THROWABLES.iter().find(|(n, _)| *n == name)?;
            throwable_subclass(name, super_name)
        }
    };
    Some(class_file)
}

/// Names of every built-in class.
pub fn class_names() -> impl Iterator<Item = &'static str> {
    [
        OBJECT,
        STRING,
        THROWABLE,
        "java/lang/Cloneable",
        "java/io/Serializable",
        "java/lang/System",
        "java/lang/Float",
        "java/lang/Double",
    ]
    .into_iter()
    .chain(THROWABLES.iter().map(|(name, _)| *name))
}

fn object() -> JVMClassFile {
    let mut builder = ClassFileBuilder::new(OBJECT, None);
    let public = AccessFlags::PUBLIC;
    builder
        .add_method(public, "<init>", "()V", 0, 1, vec![RETURN])
        .add_method(
            public,
            "equals",
            "(Ljava/lang/Object;)Z",
            2,
            2,
            vec![
                ALOAD_0, ALOAD_1, IF_ACMPNE, 0x00, 0x05, ICONST_1, IRETURN, ICONST_0, IRETURN,
            ],
        )
        .add_native_method(public, "hashCode", "()I")
        .add_native_method(AccessFlags::PRIVATE | AccessFlags::STATIC, "registerNatives", "()V");
    builder.build()
}

/// Constructor calling the super class's no-arg constructor.
fn default_constructor(builder: &mut ClassFileBuilder, super_name: &str) {
    let [hi, lo] = u2(builder.method_ref(super_name, "<init>", "()V"));
    builder.add_method(
        AccessFlags::PUBLIC,
        "<init>",
        "()V",
        1,
        1,
        vec![ALOAD_0, INVOKESPECIAL, hi, lo, RETURN],
    );
}

fn string() -> JVMClassFile {
    let mut builder = ClassFileBuilder::new(STRING, Some(OBJECT));
    builder
        .set_access_flags(AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SUPER)
        .add_interface("java/io/Serializable")
        .add_field(AccessFlags::PRIVATE | AccessFlags::FINAL, "value", "[C");
    default_constructor(&mut builder, OBJECT);
    let [hi, lo] = u2(builder.field_ref(STRING, "value", "[C"));
    builder
        .add_method(
            AccessFlags::PUBLIC,
            "length",
            "()I",
            1,
            1,
            vec![ALOAD_0, GETFIELD, hi, lo, ARRAYLENGTH, IRETURN],
        )
        .add_method(
            AccessFlags::PUBLIC,
            "charAt",
            "(I)C",
            2,
            2,
            vec![ALOAD_0, GETFIELD, hi, lo, ILOAD_1, CALOAD, IRETURN],
        );
    builder.build()
}

fn throwable() -> JVMClassFile {
    let mut builder = ClassFileBuilder::new(THROWABLE, Some(OBJECT));
    builder
        .add_interface("java/io/Serializable")
        .add_field(AccessFlags::PRIVATE, "detailMessage", "Ljava/lang/String;");
    default_constructor(&mut builder, OBJECT);
    let [init_hi, init_lo] = u2(builder.method_ref(OBJECT, "<init>", "()V"));
    let [hi, lo] = u2(builder.field_ref(THROWABLE, "detailMessage", "Ljava/lang/String;"));
    builder
        .add_method(
            AccessFlags::PUBLIC,
            "<init>",
            "(Ljava/lang/String;)V",
            2,
            2,
            vec![
                ALOAD_0, DUP, INVOKESPECIAL, init_hi, init_lo, ALOAD_1, PUTFIELD, hi, lo, RETURN,
            ],
        )
        .add_method(
            AccessFlags::PUBLIC,
            "getMessage",
            "()Ljava/lang/String;",
            1,
            1,
            vec![ALOAD_0, GETFIELD, hi, lo, ARETURN],
        );
    builder.build()
}

fn throwable_subclass(name: &str, super_name: &str) -> JVMClassFile {
    let mut builder = ClassFileBuilder::new(name, Some(super_name));
    default_constructor(&mut builder, super_name);
    let [hi, lo] = u2(builder.method_ref(super_name, "<init>", "(Ljava/lang/String;)V"));
    builder.add_method(
        AccessFlags::PUBLIC,
        "<init>",
        "(Ljava/lang/String;)V",
        2,
        2,
        vec![ALOAD_0, ALOAD_1, INVOKESPECIAL, hi, lo, RETURN],
    );
    builder.build()
}

fn marker_interface(name: &str) -> JVMClassFile {
    let mut builder = ClassFileBuilder::new(name, Some(OBJECT));
    builder.set_access_flags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT);
    builder.build()
}

fn system() -> JVMClassFile {
    let mut builder = ClassFileBuilder::new("java/lang/System", Some(OBJECT));
    builder.set_access_flags(AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SUPER);
    let [hi, lo] = u2(builder.method_ref("java/lang/System", "registerNatives", "()V"));
    builder
        .add_native_method(AccessFlags::PRIVATE | AccessFlags::STATIC, "registerNatives", "()V")
        .add_native_method(
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            "arraycopy",
            "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        )
        .add_method(
            AccessFlags::STATIC,
            "<clinit>",
            "()V",
            0,
            0,
            vec![INVOKESTATIC, hi, lo, RETURN],
        );
    builder.build()
}

fn boxed_bits(
    name: &str,
    to_bits: &str,
    to_bits_descriptor: &str,
    from_bits: &str,
    from_bits_descriptor: &str,
) -> JVMClassFile {
    let mut builder = ClassFileBuilder::new(name, Some(OBJECT));
    builder.set_access_flags(AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SUPER);
    let flags = AccessFlags::PUBLIC | AccessFlags::STATIC;
    builder
        .add_native_method(flags, to_bits, to_bits_descriptor)
        .add_native_method(flags, from_bits, from_bits_descriptor);
    builder.build()
}
