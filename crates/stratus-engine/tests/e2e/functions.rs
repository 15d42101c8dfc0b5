//! Function declarations, calls and the entry point

use super::harness::*;
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, TypeExpr};
use stratus_engine::{Value, VmOptions};

// ============================================================================
// Direct calls
// ============================================================================

#[test]
fn test_function_with_parameters() {
    let mut b = ModuleBuilder::new("params.st");
    let sum3 = b.function(
        "sum3",
        &[("a", TypeExpr::I64), ("b", TypeExpr::I64), ("c", TypeExpr::I64)],
        TypeExpr::I64,
        |f| {
            let (a, c, d) = (f.param(0), f.param(1), f.param(2));
            f.ret(add(add(var(a), var(c)), var(d)));
        },
    );
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(func(sum3), vec![int(10), int(20), int(12)])));
    expect_i64(b.finish(), 42);
}

#[test]
fn test_recursive_fibonacci() {
    let mut b = ModuleBuilder::new("fib.st");
    let fib = b.declare_function("fib", &[("n", TypeExpr::I64)], TypeExpr::I64);
    b.define(fib, |f| {
        let n = f.param(0);
        f.if_then(lt(var(n), int(2)), |f| f.ret(var(n)));
        f.ret(add(
            call(func(fib), vec![sub(var(n), int(1))]),
            call(func(fib), vec![sub(var(n), int(2))]),
        ));
    });
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(func(fib), vec![int(15)])));
    expect_i64(b.finish(), 610);
}

#[test]
fn test_mutual_recursion_through_forward_references() {
    let mut b = ModuleBuilder::new("parity.st");
    // main comes first so both helpers are called before they are compiled
    let main = b.declare_function("main", &[], TypeExpr::I64);
    let is_even = b.declare_function("isEven", &[("n", TypeExpr::I64)], TypeExpr::Bool);
    let is_odd = b.declare_function("isOdd", &[("n", TypeExpr::I64)], TypeExpr::Bool);
    b.define(main, |f| {
        f.if_then(call(func(is_even), vec![int(10)]), |f| {
            f.if_then(call(func(is_odd), vec![int(7)]), |f| f.ret(int(1)));
        });
        f.ret(int(0));
    });
    b.define(is_even, |f| {
        let n = f.param(0);
        f.if_then(eq(var(n), int(0)), |f| f.ret(boolean(true)));
        f.ret(call(func(is_odd), vec![sub(var(n), int(1))]));
    });
    b.define(is_odd, |f| {
        let n = f.param(0);
        f.if_then(eq(var(n), int(0)), |f| f.ret(boolean(false)));
        f.ret(call(func(is_even), vec![sub(var(n), int(1))]));
    });
    expect_i64(b.finish(), 1);
}

#[test]
fn test_void_function_side_effect_through_object() {
    let mut b = ModuleBuilder::new("void.st");
    let counter = b.class("Counter");
    b.field(counter, "hits", TypeExpr::I64);
    let bump = b.function("bump", &[("c", TypeExpr::class(counter))], TypeExpr::Void, |f| {
        let c = f.param(0);
        f.expr(compound(BinaryOp::Add, member(var(c), "hits"), int(1)));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let c = f.let_var("c", None, Some(new(TypeExpr::class(counter), vec![])));
        f.expr(call(func(bump), vec![var(c)]));
        f.expr(call(func(bump), vec![var(c)]));
        f.expr(call(func(bump), vec![var(c)]));
        f.ret(member(var(c), "hits"));
    });
    expect_i64(b.finish(), 3);
}

// ============================================================================
// Overloads and function values
// ============================================================================

#[test]
fn test_overload_exact_match_is_called() {
    let mut b = ModuleBuilder::new("overload.st");
    let narrow = b.function("pick", &[("x", TypeExpr::I32)], TypeExpr::I64, |f| f.ret(int(32)));
    let wide = b.function("pick", &[("x", TypeExpr::I64)], TypeExpr::I64, |f| f.ret(int(64)));
    b.function("main", &[], TypeExpr::I64, |f| {
        let small = f.let_var("small", Some(TypeExpr::I32), Some(int(1)));
        let big = f.let_var("big", Some(TypeExpr::I64), Some(int(1)));
        f.ret(add(
            call(overloads(&[narrow, wide]), vec![var(small)]),
            call(overloads(&[narrow, wide]), vec![var(big)]),
        ));
    });
    expect_i64(b.finish(), 96);
}

#[test]
fn test_function_value_called_indirectly() {
    let mut b = ModuleBuilder::new("fnvalue.st");
    let double = b.function("double", &[("x", TypeExpr::I64)], TypeExpr::I64, |f| {
        let x = f.param(0);
        f.ret(mul(var(x), int(2)));
    });
    let apply = b.function(
        "apply",
        &[
            ("f", TypeExpr::function(vec![TypeExpr::I64], TypeExpr::I64)),
            ("x", TypeExpr::I64),
        ],
        TypeExpr::I64,
        |f| {
            let (g, x) = (f.param(0), f.param(1));
            f.ret(call(var(g), vec![var(x)]));
        },
    );
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(func(apply), vec![func(double), int(21)])));
    expect_i64(b.finish(), 42);
}

// ============================================================================
// Entry point
// ============================================================================

#[test]
fn test_main_receives_program_arguments() {
    let mut b = ModuleBuilder::new("args.st");
    b.function("main", &[("args", TypeExpr::array(TypeExpr::String))], TypeExpr::I64, |f| {
        let args = f.param(0);
        let first = f.let_var("first", None, Some(index(var(args), int(0))));
        f.ret(add(mul(member(var(args), "length"), int(100)), member(var(first), "length")));
    });
    let chunk = build(b.finish()).unwrap();
    let args = vec!["hello".to_string(), "x".to_string()];
    assert_eq!(run_chunk(chunk, args, VmOptions::default()).unwrap(), Value::Int(205));
}

#[test]
fn test_void_main_returns_null() {
    let mut b = ModuleBuilder::new("void_main.st");
    b.function("main", &[], TypeExpr::Void, |f| {
        f.let_var("unused", None, Some(int(1)));
    });
    assert_eq!(compile_and_run(b.finish()).unwrap(), Value::Null);
}

#[test]
fn test_missing_main_is_fatal() {
    let mut b = ModuleBuilder::new("nomain.st");
    b.function("helper", &[], TypeExpr::I64, |f| f.ret(int(1)));
    expect_compile_error(b.finish(), "No entry point");
}

#[test]
fn test_main_with_wrong_signature_is_fatal() {
    let mut b = ModuleBuilder::new("badmain.st");
    b.function("main", &[("n", TypeExpr::I64)], TypeExpr::I64, |f| {
        let n = f.param(0);
        f.ret(var(n));
    });
    expect_compile_error(b.finish(), "Invalid entry point");
}
