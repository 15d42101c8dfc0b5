use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stratus_engine::ast::build::*;
use stratus_engine::ast::{BinaryOp, Module, TypeExpr};
use stratus_engine::{compile, Chunk, CompileOptions, Vm, VmOptions};

fn sum_loop(n: i64) -> Module {
    let mut b = ModuleBuilder::new("sum.st");
    b.function("main", &[], TypeExpr::I64, |f| {
        let i = f.let_var("i", None, Some(int(0)));
        let total = f.let_var("total", None, Some(int(0)));
        f.while_loop(lt(var(i), int(n)), |f| {
            f.expr(compound(BinaryOp::Add, var(total), binary(BinaryOp::Rem, var(i), int(7))));
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.ret(var(total));
    });
    b.finish()
}

fn fib(n: i64) -> Module {
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
    b.function("main", &[], TypeExpr::I64, |f| f.ret(call(func(fib), vec![int(n)])));
    b.finish()
}

fn allocations(n: i64) -> Module {
    let mut b = ModuleBuilder::new("alloc.st");
    let pair = b.class("Pair");
    b.field(pair, "left", TypeExpr::I64);
    b.field(pair, "right", TypeExpr::I64);
    b.function("main", &[], TypeExpr::I64, |f| {
        let i = f.let_var("i", None, Some(int(0)));
        let total = f.let_var("total", None, Some(int(0)));
        f.while_loop(lt(var(i), int(n)), |f| {
            let p = f.let_var("p", None, Some(new(TypeExpr::class(pair), vec![])));
            f.expr(assign(member(var(p), "left"), var(i)));
            f.expr(compound(BinaryOp::Add, var(total), member(var(p), "left")));
            f.expr(compound(BinaryOp::Add, var(i), int(1)));
        });
        f.ret(var(total));
    });
    b.finish()
}

fn chunk(module: Module) -> Chunk {
    compile(module, &CompileOptions::default()).unwrap().chunk
}

fn run(chunk: &Chunk, options: &VmOptions) {
    let mut vm = Vm::new(chunk.clone(), vec![], options.clone()).unwrap();
    black_box(vm.run().unwrap());
}

fn bench_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops");
    for n in [1_000i64, 100_000] {
        let chunk = chunk(sum_loop(n));
        group.bench_with_input(BenchmarkId::new("sum", n), &chunk, |b, chunk| {
            b.iter(|| run(chunk, &VmOptions::default()));
        });
    }
    group.finish();
}

fn bench_calls(c: &mut Criterion) {
    let chunk = chunk(fib(20));
    c.bench_function("fib_20", |b| b.iter(|| run(&chunk, &VmOptions::default())));
}

fn bench_gc(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc");
    let chunk = chunk(allocations(10_000));
    for interval in [64usize, 1024] {
        let options = VmOptions::default().with_gc_interval(interval);
        group.bench_with_input(BenchmarkId::new("interval", interval), &options, |b, options| {
            b.iter(|| run(&chunk, options));
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_fib", |b| b.iter(|| chunk(black_box(fib(20)))));
}

criterion_group!(benches, bench_loops, bench_calls, bench_gc, bench_compile);
criterion_main!(benches);
