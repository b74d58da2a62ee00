//! Straight-line and looping bytecode run step by step; the result is
//! left in local 0.
mod common;

use common::run_to_return;

#[test]
fn addition() {
    // iconst_1, iconst_2, iadd, istore_0, return
    let locals = run_to_return(vec![0x04, 0x05, 0x60, 0x3b, 0xb1], 2, 1);
    assert_eq!(locals.get_int(0), 3);
}

#[test]
fn subtraction() {
    // bipush 10, iconst_3, isub, istore_0, return
    let locals = run_to_return(vec![0x10, 10, 0x06, 0x64, 0x3b, 0xb1], 2, 1);
    assert_eq!(locals.get_int(0), 7);
}

#[test]
fn negation() {
    // bipush 42, ineg, istore_0, return
    let locals = run_to_return(vec![0x10, 42, 0x74, 0x3b, 0xb1], 1, 1);
    assert_eq!(locals.get_int(0), -42);
}

#[test]
fn locals_and_add() {
    let code = vec![
        0x08, // iconst_5
        0x3b, // istore_0
        0x10, 10, // bipush 10
        0x3c, // istore_1
        0x1a, // iload_0
        0x1b, // iload_1
        0x60, // iadd
        0x3b, // istore_0
        0xb1, // return
    ];
    let locals = run_to_return(code, 2, 2);
    assert_eq!(locals.get_int(0), 15);
    assert_eq!(locals.get_int(1), 10);
}

#[test]
fn loop_sums_one_to_three() {
    let code = vec![
        0x03, // 0: iconst_0
        0x3b, // 1: istore_0
        0x04, // 2: iconst_1
        0x3c, // 3: istore_1
        0x1b, // 4: iload_1
        0x06, // 5: iconst_3
        0xa3, 0x00, 0x0d, // 6: if_icmpgt +13 -> 19
        0x1a, // 9: iload_0
        0x1b, // 10: iload_1
        0x60, // 11: iadd
        0x3b, // 12: istore_0
        0x84, 0x01, 0x01, // 13: iinc 1 1
        0xa7, 0xff, 0xf4, // 16: goto -12 -> 4
        0xb1, // 19: return
    ];
    let locals = run_to_return(code, 2, 2);
    assert_eq!(locals.get_int(0), 6);
    assert_eq!(locals.get_int(1), 4);
}

#[test]
fn complex_expression() {
    // (10 + 20) * 3 - 5
    let code = vec![
        0x10, 10, // bipush 10
        0x10, 20, // bipush 20
        0x60, // iadd
        0x06, // iconst_3
        0x68, // imul
        0x08, // iconst_5
        0x64, // isub
        0x3b, // istore_0
        0xb1, // return
    ];
    let locals = run_to_return(code, 2, 1);
    assert_eq!(locals.get_int(0), 85);
}

#[test]
fn wide_locals() {
    let code = vec![
        0x10, 9, // bipush 9
        0xc4, 0x36, 0x01, 0x2c, // wide istore 300
        0xc4, 0x84, 0x01, 0x2c, 0x03, 0xe8, // wide iinc 300 1000
        0xc4, 0x15, 0x01, 0x2c, // wide iload 300
        0x3b, // istore_0
        0xb1, // return
    ];
    let locals = run_to_return(code, 1, 301);
    assert_eq!(locals.get_int(0), 1009);
}

#[test]
fn long_arithmetic_uses_two_slots() {
    let code = vec![
        0x0a, // lconst_1
        0x10, 40, // bipush 40
        0x79, // lshl
        0x0a, // lconst_1
        0x61, // ladd
        0x40, // lstore_1
        0x1f, // lload_1
        0x88, // l2i
        0x3b, // istore_0
        0xb1, // return
    ];
    let locals = run_to_return(code, 4, 3);
    assert_eq!(locals.get_long(1), (1i64 << 40) + 1);
    assert_eq!(locals.get_int(0), 1);
}
