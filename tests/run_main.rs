//! Running `main` of classes found on the classpath.
mod common;

use std::fs;

use common::{public_static, OBJECT};
use pretty_assertions::assert_eq;
use ristretto::error::exceptions;
use ristretto::jvm::builder::ClassFileBuilder;
use ristretto::jvm::AccessFlags;
use ristretto::{Interpreter, VmOptions};

fn hello_class() -> Vec<u8> {
    let mut builder = ClassFileBuilder::new("demo/Hello", Some(OBJECT));
    builder.set_source_file("Hello.java");
    builder.add_field(AccessFlags::STATIC, "count", "I");
    builder.add_field(AccessFlags::STATIC, "first", "I");
    let [ch, cl] = builder.field_ref("demo/Hello", "count", "I").to_be_bytes();
    let [fh, fl] = builder.field_ref("demo/Hello", "first", "I").to_be_bytes();
    let [lh, ll] = builder.method_ref("java/lang/String", "length", "()I").to_be_bytes();
    // count = args.length; first = args[0].length();
    builder.add_method(
        public_static(),
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        vec![
            0x2a, 0xbe, 0xb3, ch, cl, // count = args.length
            0x2a, 0x03, 0x32, 0xb6, lh, ll, 0xb3, fh, fl, // first = args[0].length()
            0xb1,
        ],
    );
    builder.build().to_bytes()
}

#[test]
fn runs_main_from_classpath() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("demo")).unwrap();
    fs::write(dir.path().join("demo/Hello.class"), hello_class()).unwrap();

    let vm = Interpreter::new(VmOptions::new(dir.path()));
    vm.run_main("demo.Hello", &["hello".to_string(), "world".to_string()])
        .unwrap();

    let class = vm.loader().load_class("demo/Hello").unwrap();
    assert_eq!(class.source_file(), Some("Hello.java"));
    let statics = class.static_vars();
    let count = class.find_field("count", "I").unwrap();
    let first = class.find_field("first", "I").unwrap();
    assert_eq!(statics.get_int(count.slot_id()), 2);
    assert_eq!(statics.get_int(first.slot_id()), 5);
}

#[test]
fn missing_main_class_or_method() {
    let dir = tempfile::tempdir().unwrap();
    let vm = Interpreter::new(VmOptions::new(dir.path()));
    let err = vm.run_main("demo.Missing", &[]).unwrap_err();
    assert_eq!(err.exception_class(), Some(exceptions::CLASS_NOT_FOUND_EXCEPTION));

    let mut builder = ClassFileBuilder::new("NoMain", Some(OBJECT));
    builder.add_method(public_static(), "other", "()V", 0, 0, vec![0xb1]);
    fs::write(dir.path().join("NoMain.class"), builder.build().to_bytes()).unwrap();
    let err = vm.run_main("NoMain", &[]).unwrap_err();
    assert_eq!(err.exception_class(), Some(exceptions::NO_SUCH_METHOD_ERROR));
}
