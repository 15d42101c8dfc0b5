//! Type errors reported by the checker and errors raised while running

use super::harness::*;
use std::time::Duration;
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, TypeExpr};
use stratus_engine::{compile, CompileFailure, CompileOptions, VmError, VmOptions, WarningCode, WarningConfig};

// ============================================================================
// Type errors
// ============================================================================

#[test]
fn test_ambiguous_overload_is_an_error() {
    let mut b = ModuleBuilder::new("ambiguous.st");
    let a = b.function("g", &[("x", TypeExpr::I32)], TypeExpr::I64, |f| f.ret(int(1)));
    let c = b.function("g", &[("x", TypeExpr::F64)], TypeExpr::I64, |f| f.ret(int(2)));
    b.function("main", &[], TypeExpr::I64, |f| {
        let y = f.let_var("y", Some(TypeExpr::I16), Some(int(3)));
        f.ret(call(overloads(&[a, c]), vec![var(y)]));
    });
    expect_check_error(b.finish(), "Ambiguous call to 'g'");
}

#[test]
fn test_missing_interface_member_is_an_error() {
    let mut b = ModuleBuilder::new("missing.st");
    let shape = b.interface("Shape");
    b.interface_method(shape, "area", vec![], TypeExpr::I64);
    let rock = b.class("Rock");
    b.function("main", &[], TypeExpr::I64, |f| {
        let s = f.let_var("s", None, Some(cast(new(TypeExpr::class(rock), vec![]), TypeExpr::Interface(shape))));
        f.ret(call_method(var(s), "area", vec![]));
    });
    expect_check_error(b.finish(), "Rock");
}

#[test]
fn test_missing_return_is_an_error() {
    let mut b = ModuleBuilder::new("noreturn.st");
    b.function("main", &[("args", TypeExpr::array(TypeExpr::String))], TypeExpr::I64, |f| {
        let args = f.param(0);
        f.if_then(lt(member(var(args), "length"), int(1)), |f| f.ret(int(1)));
    });
    expect_check_error(b.finish(), "does not return a value on every path");
}

#[test]
fn test_narrowing_conversion_is_an_error() {
    let mut b = ModuleBuilder::new("narrowing.st");
    b.function("main", &[], TypeExpr::I8, |f| {
        let big = f.let_var("big", Some(TypeExpr::I64), Some(int(300)));
        f.ret(var(big));
    });
    expect_check_error(b.finish(), "expected i8, got i64");
}

#[test]
fn test_every_error_in_a_module_is_reported() {
    let mut b = ModuleBuilder::new("many.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        f.let_var("a", Some(TypeExpr::Bool), Some(int(1)));
        f.let_var("b", Some(TypeExpr::String), Some(boolean(true)));
        f.ret(string("three"));
    });
    match compile(b.finish(), &CompileOptions::default()) {
        Err(CompileFailure::Check(errors)) => assert_eq!(errors.len(), 3, "{:?}", errors),
        other => panic!("expected three type errors, got {:?}", other.map(|c| c.warnings)),
    }
}

#[test]
fn test_denied_warning_fails_compilation() {
    let build = || {
        let mut b = ModuleBuilder::new("warn.st");
        b.function("main", &[], TypeExpr::I64, |f| {
            f.ret(int(1));
            f.ret(int(2));
        });
        b.finish()
    };

    let compiled = compile(build(), &CompileOptions::default()).unwrap();
    assert_eq!(compiled.warnings.len(), 1);
    assert_eq!(compiled.warnings[0].code(), WarningCode::UnreachableCode);

    let mut warnings = WarningConfig::default();
    warnings.deny.insert(WarningCode::UnreachableCode);
    let failure = compile(build(), &CompileOptions { warnings }).unwrap_err();
    assert!(failure.to_string().contains("type error"));
}

// ============================================================================
// Runtime errors
// ============================================================================

#[test]
fn test_division_by_zero() {
    let mut b = ModuleBuilder::new("divzero.st");
    let div = b.function("div", &[("a", TypeExpr::I64), ("b", TypeExpr::I64)], TypeExpr::I64, |f| {
        let (a, c) = (f.param(0), f.param(1));
        f.ret(binary(BinaryOp::Div, var(a), var(c)));
    });
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(func(div), vec![int(1), int(0)])));
    expect_runtime_error(b.finish(), |e| matches!(e, VmError::DivisionByZero));
}

#[test]
fn test_index_out_of_bounds() {
    let mut b = ModuleBuilder::new("bounds.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let xs = f.let_var("xs", None, Some(array(vec![int(1), int(2), int(3)])));
        f.ret(index(var(xs), int(3)));
    });
    expect_runtime_error(b.finish(), |e| {
        matches!(e, VmError::IndexOutOfBounds { index: 3, length: 3 })
    });
}

#[test]
fn test_unbounded_recursion_overflows() {
    let mut b = ModuleBuilder::new("overflow.st");
    let forever = b.declare_function("forever", &[("n", TypeExpr::I64)], TypeExpr::I64);
    b.define(forever, |f| {
        let n = f.param(0);
        f.ret(add(call(func(forever), vec![add(var(n), int(1))]), int(1)));
    });
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(func(forever), vec![int(0)])));
    expect_runtime_error(b.finish(), |e| matches!(e, VmError::StackOverflow));
}

#[test]
fn test_timeout_stops_infinite_loop() {
    let mut b = ModuleBuilder::new("spin.st");
    b.function("main", &[], TypeExpr::Void, |f| {
        let i = f.let_var("i", None, Some(int(0)));
        f.while_loop(boolean(true), |f| {
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
    });
    let chunk = build(b.finish()).unwrap();
    let options = VmOptions::default().with_timeout(Duration::from_millis(50));
    match run_chunk(chunk, vec![], options) {
        Err(E2EError::Vm(VmError::Timeout { elapsed_ms })) => assert!(elapsed_ms >= 50),
        other => panic!("expected a timeout, got {:?}", other),
    }
}
