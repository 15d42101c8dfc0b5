//! Arrays, strings and loops

use super::harness::*;
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, TypeExpr};

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_while_loop_sum() {
    let mut b = ModuleBuilder::new("loop.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let i = f.let_var("i", None, Some(int(1)));
        let total = f.let_var("total", None, Some(int(0)));
        f.while_loop(binary(BinaryOp::Le, var(i), int(100)), |f| {
            f.expr(compound(BinaryOp::Add, var(total), var(i)));
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.ret(var(total));
    });
    expect_i64(b.finish(), 5050);
}

#[test]
fn test_nested_loops_with_early_return() {
    let mut b = ModuleBuilder::new("nested.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let i = f.let_var("i", None, Some(int(0)));
        f.while_loop(lt(var(i), int(10)), |f| {
            let j = f.let_var("j", None, Some(int(0)));
            f.while_loop(lt(var(j), int(10)), |f| {
                f.if_then(eq(mul(var(i), var(j)), int(42)), |f| {
                    f.ret(add(mul(var(i), int(10)), var(j)));
                });
                f.expr(compound(BinaryOp::Add, var(j), int(1)));
            });
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.ret(int(-1));
    });
    // first pair in row order is 6 * 7
    expect_i64(b.finish(), 67);
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_array_literal_index_and_length() {
    let mut b = ModuleBuilder::new("array.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let xs = f.let_var(
            "xs",
            Some(TypeExpr::array(TypeExpr::I32)),
            Some(array(vec![int(3), int(1), int(4), int(1), int(5)])),
        );
        let i = f.let_var("i", None, Some(int(0)));
        let total = f.let_var("total", Some(TypeExpr::I32), Some(int(0)));
        f.while_loop(lt(var(i), member(var(xs), "length")), |f| {
            f.expr(compound(BinaryOp::Add, var(total), index(var(xs), var(i))));
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.ret(add(mul(var(total), int(10)), member(var(xs), "length")));
    });
    expect_i64(b.finish(), 145);
}

#[test]
fn test_array_element_store_and_compound() {
    let mut b = ModuleBuilder::new("store.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let xs = f.let_var("xs", None, Some(array(vec![int(0), int(0), int(0)])));
        f.expr(assign(index(var(xs), int(0)), int(7)));
        f.expr(assign(index(var(xs), int(2)), int(5)));
        f.expr(compound(BinaryOp::Mul, index(var(xs), int(2)), int(7)));
        f.ret(add(index(var(xs), int(0)), index(var(xs), int(2))));
    });
    expect_i64(b.finish(), 42);
}

#[test]
fn test_array_of_objects() {
    let mut b = ModuleBuilder::new("objects.st");
    let node = b.class("Node");
    b.field(node, "weight", TypeExpr::I64);
    b.constructor(node, &[("weight", TypeExpr::I64)], |f| {
        let w = f.param(0);
        f.expr(assign(member(this(), "weight"), var(w)));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let nodes = f.let_var(
            "nodes",
            None,
            Some(array(vec![
                new(TypeExpr::class(node), vec![int(10)]),
                new(TypeExpr::class(node), vec![int(20)]),
                new(TypeExpr::class(node), vec![int(12)]),
            ])),
        );
        let i = f.let_var("i", None, Some(int(0)));
        let total = f.let_var("total", None, Some(int(0)));
        f.while_loop(lt(var(i), member(var(nodes), "length")), |f| {
            f.expr(compound(BinaryOp::Add, var(total), member(index(var(nodes), var(i)), "weight")));
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.ret(var(total));
    });
    expect_i64(b.finish(), 42);
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_concat_and_length() {
    let mut b = ModuleBuilder::new("concat.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let s = f.let_var("s", None, Some(add(string("answer="), string("42"))));
        f.ret(member(var(s), "length"));
    });
    expect_i64(b.finish(), 9);
}

#[test]
fn test_string_equality_compares_contents() {
    let mut b = ModuleBuilder::new("streq.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let n = f.let_var("n", None, Some(int(42)));
        let s = f.let_var("s", None, Some(add(string("n="), var(n))));
        f.if_then(eq(var(s), string("n=42")), |f| f.ret(int(1)));
        f.ret(int(0));
    });
    expect_i64(b.finish(), 1);
}

#[test]
fn test_negative_int_to_string() {
    let mut b = ModuleBuilder::new("neg_str.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let n = f.let_var("n", None, Some(int(-17)));
        let s = f.let_var("s", None, Some(add(string(""), var(n))));
        f.if_then(binary(BinaryOp::Ne, var(s), string("-17")), |f| f.ret(int(0)));
        f.ret(member(var(s), "length"));
    });
    expect_i64(b.finish(), 3);
}

#[test]
fn test_string_index_yields_bytes() {
    let mut b = ModuleBuilder::new("bytes.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let s = f.let_var("s", None, Some(string("AB")));
        let first = f.let_var("first", Some(TypeExpr::I64), Some(index(var(s), int(0))));
        let second = f.let_var("second", Some(TypeExpr::I64), Some(index(var(s), int(1))));
        f.ret(add(var(first), var(second)));
    });
    expect_i64(b.finish(), 65 + 66);
}
