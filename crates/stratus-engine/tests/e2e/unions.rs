//! Union values and `is` narrowing

use super::harness::*;
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, TypeExpr};

#[test]
fn test_is_narrows_both_branches_of_two_member_union() {
    let mut b = ModuleBuilder::new("narrow.st");
    let either = TypeExpr::union(vec![TypeExpr::I64, TypeExpr::String]);
    let measure = b.function("measure", &[("v", either.clone())], TypeExpr::I64, |f| {
        let v = f.param(0);
        // then: v is i64; else: v is string
        f.if_else(
            is(var(v), TypeExpr::I64),
            |f| f.ret(add(var(v), int(1))),
            |f| f.ret(member(var(v), "length")),
        );
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        f.ret(add(
            call(func(measure), vec![int(41)]),
            mul(call(func(measure), vec![string("abc")]), int(100)),
        ));
    });
    expect_i64(b.finish(), 342);
}

#[test]
fn test_nullable_local_defaults_to_null() {
    let mut b = ModuleBuilder::new("nullable.st");
    let maybe = TypeExpr::union(vec![TypeExpr::I64, TypeExpr::Null]);
    b.function("main", &[], TypeExpr::I64, |f| {
        let v = f.let_var("v", Some(maybe.clone()), None);
        f.if_then(is(var(v), TypeExpr::Null), |f| f.ret(int(1)));
        f.ret(int(2));
    });
    expect_i64(b.finish(), 1);
}

#[test]
fn test_reassigned_union_changes_tag() {
    let mut b = ModuleBuilder::new("retag.st");
    let maybe = TypeExpr::union(vec![TypeExpr::I64, TypeExpr::Null]);
    b.function("main", &[], TypeExpr::I64, |f| {
        let v = f.let_var("v", Some(maybe.clone()), Some(null()));
        let total = f.let_var("total", None, Some(int(0)));
        f.if_then(is(var(v), TypeExpr::I64), |f| f.ret(int(-1)));
        f.expr(assign(var(v), int(20)));
        f.if_then(is(var(v), TypeExpr::I64), |f| {
            f.expr(assign(var(total), add(var(v), int(22))));
        });
        f.ret(var(total));
    });
    expect_i64(b.finish(), 42);
}

#[test]
fn test_three_member_union_stays_wide_in_else_branch() {
    let mut b = ModuleBuilder::new("three.st");
    let any = TypeExpr::union(vec![TypeExpr::I64, TypeExpr::Bool, TypeExpr::String]);
    let classify = b.function("classify", &[("v", any.clone())], TypeExpr::I64, |f| {
        let v = f.param(0);
        f.if_else(
            is(var(v), TypeExpr::I64),
            |f| f.ret(var(v)),
            |f| {
                // still bool | string here
                f.if_then(is(var(v), TypeExpr::Bool), |f| f.ret(int(100)));
                f.ret(int(1000));
            },
        );
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        f.ret(add(
            add(
                call(func(classify), vec![int(7)]),
                call(func(classify), vec![boolean(true)]),
            ),
            call(func(classify), vec![string("s")]),
        ));
    });
    expect_i64(b.finish(), 1107);
}

#[test]
fn test_union_of_classes() {
    let mut b = ModuleBuilder::new("classes.st");
    let cat = b.class("Cat");
    b.field(cat, "lives", TypeExpr::I64);
    let dog = b.class("Dog");
    b.field(dog, "bones", TypeExpr::I64);
    let pet = TypeExpr::union(vec![TypeExpr::class(cat), TypeExpr::class(dog)]);
    let score = b.function("score", &[("p", pet.clone())], TypeExpr::I64, |f| {
        let p = f.param(0);
        f.if_else(
            is(var(p), TypeExpr::class(cat)),
            |f| f.ret(member(var(p), "lives")),
            |f| f.ret(member(var(p), "bones")),
        );
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let c = f.let_var("c", None, Some(new(TypeExpr::class(cat), vec![])));
        f.expr(assign(member(var(c), "lives"), int(9)));
        let d = f.let_var("d", None, Some(new(TypeExpr::class(dog), vec![])));
        f.expr(assign(member(var(d), "bones"), int(3)));
        f.ret(mul(call(func(score), vec![var(c)]), call(func(score), vec![var(d)])));
    });
    expect_i64(b.finish(), 27);
}

#[test]
fn test_union_equality_compares_tags_and_payloads() {
    let mut b = ModuleBuilder::new("union_eq.st");
    let maybe = TypeExpr::union(vec![TypeExpr::I64, TypeExpr::Null]);
    b.function("main", &[], TypeExpr::I64, |f| {
        let a = f.let_var("a", Some(maybe.clone()), Some(int(3)));
        let c = f.let_var("c", Some(maybe.clone()), Some(int(3)));
        let n = f.let_var("n", Some(maybe.clone()), Some(null()));
        let m = f.let_var("m", Some(maybe.clone()), Some(null()));
        let score = f.let_var("score", None, Some(int(0)));
        // separate boxes holding the same value
        f.if_then(eq(var(a), var(c)), |f| {
            f.expr(compound(BinaryOp::Add, var(score), int(1)));
        });
        // different tags
        f.if_then(binary(BinaryOp::Ne, var(a), var(n)), |f| {
            f.expr(compound(BinaryOp::Add, var(score), int(10)));
        });
        // both null
        f.if_then(eq(var(n), var(m)), |f| {
            f.expr(compound(BinaryOp::Add, var(score), int(100)));
        });
        f.expr(assign(var(c), int(4)));
        f.if_then(eq(var(a), var(c)), |f| {
            f.expr(compound(BinaryOp::Add, var(score), int(1000)));
        });
        f.ret(var(score));
    });
    expect_i64(b.finish(), 111);
}

#[test]
fn test_union_equality_compares_string_contents() {
    let mut b = ModuleBuilder::new("union_str_eq.st");
    let text = TypeExpr::union(vec![TypeExpr::String, TypeExpr::I64]);
    b.function("main", &[], TypeExpr::I64, |f| {
        let s = f.let_var("s", Some(text.clone()), Some(add(string("ab"), string("c"))));
        let t = f.let_var("t", Some(text.clone()), Some(string("abc")));
        let u = f.let_var("u", Some(text.clone()), Some(string("abd")));
        let score = f.let_var("score", None, Some(int(0)));
        f.if_then(eq(var(s), var(t)), |f| {
            f.expr(compound(BinaryOp::Add, var(score), int(1)));
        });
        f.if_then(eq(var(s), var(u)), |f| {
            f.expr(compound(BinaryOp::Add, var(score), int(10)));
        });
        f.ret(var(score));
    });
    expect_i64(b.finish(), 1);
}
