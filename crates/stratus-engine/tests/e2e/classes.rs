//! Classes, interfaces, generics and enums

use super::harness::*;
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, ClassId, FunctionId, TypeExpr};

// ============================================================================
// Classes
// ============================================================================

/// `class Point { x: i64; y: i64; constructor(x, y); sum(): i64 }`
fn point(b: &mut ModuleBuilder) -> (ClassId, FunctionId) {
    let point = b.class("Point");
    b.field(point, "x", TypeExpr::I64);
    b.field(point, "y", TypeExpr::I64);
    b.constructor(point, &[("x", TypeExpr::I64), ("y", TypeExpr::I64)], |f| {
        let (x, y) = (f.param(0), f.param(1));
        f.expr(assign(member(this(), "x"), var(x)));
        f.expr(assign(member(this(), "y"), var(y)));
    });
    let sum = b.method(point, "sum", &[], TypeExpr::I64, |f| {
        f.ret(add(member(this(), "x"), member(this(), "y")));
    });
    (point, sum)
}

#[test]
fn test_constructor_and_method() {
    let mut b = ModuleBuilder::new("point.st");
    let (point, _) = point(&mut b);
    b.function("main", &[], TypeExpr::I64, |f| {
        let p = f.let_var("p", None, Some(new(TypeExpr::class(point), vec![int(30), int(12)])));
        f.ret(call_method(var(p), "sum", vec![]));
    });
    expect_i64(b.finish(), 42);
}

#[test]
fn test_method_calls_sibling_method() {
    let mut b = ModuleBuilder::new("sibling.st");
    let (point, sum) = point(&mut b);
    b.method(point, "doubled", &[], TypeExpr::I64, |f| {
        f.ret(mul(call(self_method(&[sum]), vec![]), int(2)));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let p = f.let_var("p", None, Some(new(TypeExpr::class(point), vec![int(4), int(3)])));
        f.ret(call_method(var(p), "doubled", vec![]));
    });
    expect_i64(b.finish(), 14);
}

#[test]
fn test_compound_assignment_on_field() {
    let mut b = ModuleBuilder::new("field_compound.st");
    let (point, _) = point(&mut b);
    b.function("main", &[], TypeExpr::I64, |f| {
        let p = f.let_var("p", None, Some(new(TypeExpr::class(point), vec![int(1), int(2)])));
        f.expr(compound(BinaryOp::Add, member(var(p), "x"), int(10)));
        f.expr(compound(BinaryOp::Mul, member(var(p), "y"), int(5)));
        f.ret(call_method(var(p), "sum", vec![]));
    });
    expect_i64(b.finish(), 21);
}

#[test]
fn test_narrow_fields_truncate_on_store() {
    let mut b = ModuleBuilder::new("narrow.st");
    let cell = b.class("Cell");
    b.field(cell, "small", TypeExpr::U8);
    b.field(cell, "wide", TypeExpr::U32);
    b.function("main", &[], TypeExpr::U32, |f| {
        let c = f.let_var("c", None, Some(new(TypeExpr::class(cell), vec![])));
        f.expr(assign(member(var(c), "small"), int(250)));
        f.expr(compound(BinaryOp::Add, member(var(c), "small"), int(10)));
        f.expr(assign(member(var(c), "wide"), int(1000)));
        f.ret(add(member(var(c), "small"), member(var(c), "wide")));
    });
    // 260 wraps to 4 in a u8 slot
    expect_i64(b.finish(), 1004);
}

#[test]
fn test_object_reference_fields() {
    let mut b = ModuleBuilder::new("nested.st");
    let (point, _) = point(&mut b);
    let line = b.class("Line");
    b.field(line, "from", TypeExpr::class(point));
    b.field(line, "to", TypeExpr::class(point));
    b.function("main", &[], TypeExpr::I64, |f| {
        let l = f.let_var("l", None, Some(new(TypeExpr::class(line), vec![])));
        f.expr(assign(member(var(l), "from"), new(TypeExpr::class(point), vec![int(1), int(2)])));
        f.expr(assign(member(var(l), "to"), new(TypeExpr::class(point), vec![int(10), int(20)])));
        f.ret(sub(
            call_method(member(var(l), "to"), "sum", vec![]),
            call_method(member(var(l), "from"), "sum", vec![]),
        ));
    });
    expect_i64(b.finish(), 27);
}

#[test]
fn test_user_defined_operator_method() {
    let mut b = ModuleBuilder::new("money.st");
    let money = b.class("Money");
    b.field(money, "cents", TypeExpr::I64);
    b.constructor(money, &[("cents", TypeExpr::I64)], |f| {
        let cents = f.param(0);
        f.expr(assign(member(this(), "cents"), var(cents)));
    });
    b.method(money, "+", &[("other", TypeExpr::class(money))], TypeExpr::class(money), |f| {
        let other = f.param(0);
        f.ret(new(
            TypeExpr::class(money),
            vec![add(member(this(), "cents"), member(var(other), "cents"))],
        ));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let a = f.let_var("a", None, Some(new(TypeExpr::class(money), vec![int(150)])));
        let c = f.let_var("c", None, Some(new(TypeExpr::class(money), vec![int(275)])));
        f.ret(member(add(var(a), var(c)), "cents"));
    });
    expect_i64(b.finish(), 425);
}

// ============================================================================
// Interfaces
// ============================================================================

#[test]
fn test_interface_cast_calls_bound_method() {
    let mut b = ModuleBuilder::new("shape.st");
    let shape = b.interface("Shape");
    b.interface_method(shape, "area", vec![], TypeExpr::I64);
    let square = b.class("Square");
    b.field(square, "side", TypeExpr::I64);
    b.constructor(square, &[("side", TypeExpr::I64)], |f| {
        let side = f.param(0);
        f.expr(assign(member(this(), "side"), var(side)));
    });
    b.method(square, "area", &[], TypeExpr::I64, |f| {
        f.ret(mul(member(this(), "side"), member(this(), "side")));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let s = f.let_var(
            "s",
            None,
            Some(cast(new(TypeExpr::class(square), vec![int(7)]), TypeExpr::Interface(shape))),
        );
        f.ret(call_method(var(s), "area", vec![]));
    });
    expect_i64(b.finish(), 49);
}

#[test]
fn test_interface_dispatch_over_two_classes() {
    let mut b = ModuleBuilder::new("dispatch.st");
    let shape = b.interface("Shape");
    b.interface_method(shape, "scaled", vec![TypeExpr::I64], TypeExpr::I64);
    let square = b.class("Square");
    b.method(square, "scaled", &[("k", TypeExpr::I64)], TypeExpr::I64, |f| {
        let k = f.param(0);
        f.ret(mul(var(k), int(4)));
    });
    let triangle = b.class("Triangle");
    b.method(triangle, "scaled", &[("k", TypeExpr::I64)], TypeExpr::I64, |f| {
        let k = f.param(0);
        f.ret(mul(var(k), int(3)));
    });
    let measure = b.function("measure", &[("s", TypeExpr::Interface(shape))], TypeExpr::I64, |f| {
        let s = f.param(0);
        f.ret(call_method(var(s), "scaled", vec![int(10)]));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        f.ret(add(
            call(func(measure), vec![new(TypeExpr::class(square), vec![])]),
            call(func(measure), vec![new(TypeExpr::class(triangle), vec![])]),
        ));
    });
    expect_i64(b.finish(), 70);
}

#[test]
fn test_interface_field_is_a_snapshot() {
    let mut b = ModuleBuilder::new("snapshot.st");
    let named = b.interface("Tagged");
    b.interface_field(named, "tag", TypeExpr::I64);
    let item = b.class("Item");
    b.field(item, "tag", TypeExpr::I64);
    b.function("main", &[], TypeExpr::I64, |f| {
        let it = f.let_var("it", None, Some(new(TypeExpr::class(item), vec![])));
        f.expr(assign(member(var(it), "tag"), int(5)));
        let view = f.let_var("view", Some(TypeExpr::Interface(named)), Some(var(it)));
        f.expr(assign(member(var(it), "tag"), int(9)));
        f.ret(add(mul(member(var(view), "tag"), int(10)), member(var(it), "tag")));
    });
    expect_i64(b.finish(), 59);
}

// ============================================================================
// Generics and enums
// ============================================================================

#[test]
fn test_generic_class_specialized_per_argument() {
    let mut b = ModuleBuilder::new("generic.st");
    let boxed = b.generic_class("Box", &["T"]);
    b.field(boxed, "value", TypeExpr::Param(0));
    b.constructor(boxed, &[("value", TypeExpr::Param(0))], |f| {
        let value = f.param(0);
        f.expr(assign(member(this(), "value"), var(value)));
    });
    b.method(boxed, "get", &[], TypeExpr::Param(0), |f| f.ret(member(this(), "value")));
    b.function("main", &[], TypeExpr::I64, |f| {
        let ints = f.let_var(
            "ints",
            None,
            Some(new(TypeExpr::generic(boxed, vec![TypeExpr::I64]), vec![int(40)])),
        );
        let small = f.let_var(
            "small",
            None,
            Some(new(TypeExpr::generic(boxed, vec![TypeExpr::I32]), vec![int(2)])),
        );
        f.ret(add(call_method(var(ints), "get", vec![]), call_method(var(small), "get", vec![])));
    });
    expect_i64(b.finish(), 42);
}

#[test]
fn test_enum_elements_compare() {
    let mut b = ModuleBuilder::new("enum.st");
    let color = b.enumeration("Color", &["Red", "Green", "Blue"]);
    let code = b.function("code", &[("c", TypeExpr::Enum(color))], TypeExpr::I64, |f| {
        let c = f.param(0);
        f.if_then(eq(var(c), enum_element(color, 1)), |f| f.ret(int(20)));
        f.if_then(eq(var(c), enum_element(color, 2)), |f| f.ret(int(300)));
        f.ret(int(1));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        f.ret(add(
            add(
                call(func(code), vec![enum_element(color, 0)]),
                call(func(code), vec![enum_element(color, 1)]),
            ),
            call(func(code), vec![enum_element(color, 2)]),
        ));
    });
    expect_i64(b.finish(), 321);
}
