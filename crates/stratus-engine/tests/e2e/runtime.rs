//! Garbage collection, the foreign bridge and chunk files

use super::harness::*;
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, Module, TypeExpr};
use stratus_engine::{Chunk, Value, Vm, VmOptions};

/// Allocates `rounds` short-lived nodes while one node stays reachable from a local
fn churn(rounds: i64) -> Module {
    let mut b = ModuleBuilder::new("churn.st");
    let node = b.class("Node");
    b.field(node, "weight", TypeExpr::I64);
    b.field(node, "next", TypeExpr::union(vec![TypeExpr::class(node), TypeExpr::Null]));
    b.constructor(node, &[("weight", TypeExpr::I64)], |f| {
        let w = f.param(0);
        f.expr(assign(member(this(), "weight"), var(w)));
    });
    b.function("main", &[], TypeExpr::I64, |f| {
        let keep = f.let_var("keep", None, Some(new(TypeExpr::class(node), vec![int(40)])));
        let i = f.let_var("i", None, Some(int(0)));
        f.while_loop(lt(var(i), int(rounds)), |f| {
            let tmp = f.let_var("tmp", None, Some(new(TypeExpr::class(node), vec![var(i)])));
            f.expr(assign(member(var(tmp), "next"), new(TypeExpr::class(node), vec![int(0)])));
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.expr(assign(member(var(keep), "next"), new(TypeExpr::class(node), vec![int(2)])));
        let next = f.let_var("next", None, Some(member(var(keep), "next")));
        f.if_then(is(var(next), TypeExpr::class(node)), |f| {
            f.ret(add(member(var(keep), "weight"), member(var(next), "weight")));
        });
        f.ret(int(-1));
    });
    b.finish()
}

// ============================================================================
// Garbage collection
// ============================================================================

#[test]
fn test_collection_keeps_reachable_objects() {
    let chunk = build(churn(200)).unwrap();
    let mut vm = Vm::new(chunk, vec![], VmOptions::default().with_gc_interval(4)).unwrap();
    assert_eq!(vm.run().unwrap(), Value::Int(42));

    let stats = vm.gc_stats();
    assert!(stats.collections > 0, "{:?}", stats);
    assert!(stats.freed > 0, "{:?}", stats);
    assert!(stats.live < stats.allocations, "{:?}", stats);
}

#[test]
fn test_disabled_collection_frees_nothing() {
    let chunk = build(churn(50)).unwrap();
    let mut vm = Vm::new(chunk, vec![], VmOptions::default().with_gc_interval(0)).unwrap();
    assert_eq!(vm.run().unwrap(), Value::Int(42));
    assert_eq!(vm.gc_stats().collections, 0);
    assert_eq!(vm.gc_stats().freed, 0);
}

#[test]
fn test_explicit_collection_after_run() {
    let chunk = build(churn(20)).unwrap();
    let mut vm = Vm::new(chunk, vec![], VmOptions::default().with_gc_interval(0)).unwrap();
    vm.run().unwrap();
    let before = vm.gc_stats().live;
    let freed = vm.collect_garbage().unwrap();
    assert!(freed > 0);
    assert_eq!(vm.gc_stats().live, before - freed);
}

// ============================================================================
// Foreign functions
// ============================================================================

#[cfg(unix)]
#[test]
fn test_foreign_scalar_call() {
    let mut b = ModuleBuilder::new("abs.st");
    let abs = b.foreign("abs", vec![TypeExpr::I32], TypeExpr::I32);
    b.function("main", &[], TypeExpr::I32, |f| f.ret(call(foreign(abs), vec![int(-42)])));
    expect_i64(b.finish(), 42);
}

#[cfg(unix)]
#[test]
fn test_foreign_call_receives_string_data() {
    let mut b = ModuleBuilder::new("strlen.st");
    let strlen = b.foreign("strlen", vec![TypeExpr::String], TypeExpr::U64);
    b.function("main", &[], TypeExpr::U64, |f| {
        let s = f.let_var("s", None, Some(add(string("hello, "), string("world"))));
        f.ret(call(foreign(strlen), vec![var(s)]));
    });
    expect_i64(b.finish(), 12);
}

#[test]
fn test_unknown_foreign_symbol_fails_before_running() {
    let mut b = ModuleBuilder::new("missing.st");
    let nope = b.foreign("stratus_no_such_symbol", vec![], TypeExpr::I64);
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(foreign(nope), vec![])));
    let chunk = build(b.finish()).unwrap();
    let err = Vm::new(chunk, vec![], VmOptions::default()).unwrap_err();
    assert!(err.to_string().contains("stratus_no_such_symbol"), "{}", err);
}

// ============================================================================
// Chunk files
// ============================================================================

#[test]
fn test_chunk_file_round_trip_runs_identically() {
    let chunk = build(churn(10)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churn.stbc");
    chunk.write_to(&path).unwrap();

    let loaded = Chunk::read_from(&path).unwrap();
    assert_eq!(loaded, chunk);
    assert_eq!(
        run_chunk(loaded, vec![], VmOptions::default()).unwrap(),
        run_chunk(chunk, vec![], VmOptions::default()).unwrap()
    );
}

#[test]
fn test_truncated_chunk_is_rejected() {
    let chunk = build(churn(1)).unwrap();
    let bytes = chunk.serialize();
    assert!(Chunk::deserialize(&bytes[..10]).is_err());
    assert!(Chunk::deserialize(b"NOPE").is_err());
}
