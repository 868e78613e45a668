//! Performance benchmarks for invoke-js
//!
//! Run with: cargo bench
//!
//! These benchmarks measure the invocation paths under both strategies:
//! - Runtime initialization
//! - Plain and recursive calls
//! - Construction, including class constructors with `super(...)`
//! - Host-to-script calls
//! - Body compilation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use invoke_js::ast::builder::*;
use invoke_js::ast::{Script, Statement};
use invoke_js::bytecode::Compiler;
use invoke_js::{EngineConfig, ExecutionStrategy, Runtime, Value};

const STRATEGIES: [ExecutionStrategy; 2] = [ExecutionStrategy::TreeWalk, ExecutionStrategy::Bytecode];

fn runtime(strategy: ExecutionStrategy) -> Runtime {
    Runtime::with_config(EngineConfig::default().with_strategy(strategy))
}

fn fib() -> Statement {
    function_declaration(
        "fib",
        &["n"],
        vec![
            if_(lt(ident("n"), num(2.0)), ret(ident("n")), None),
            ret(add_(
                call(ident("fib"), vec![sub_(ident("n"), num(1.0))]),
                call(ident("fib"), vec![sub_(ident("n"), num(2.0))]),
            )),
        ],
    )
}

/// Benchmark: Cold start time (runtime initialization)
fn bench_cold_start(c: &mut Criterion) {
    c.bench_function("cold_start", |b| {
        b.iter(|| {
            let runtime = Runtime::new();
            black_box(runtime)
        })
    });
}

/// Benchmark: Function calls
fn bench_function_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("function_calls");

    for strategy in STRATEGIES {
        group.bench_with_input(BenchmarkId::new("simple_call", format!("{:?}", strategy)), &strategy, |b, &strategy| {
            let mut runtime = runtime(strategy);
            let script = Script::new(vec![
                function_declaration("add", &["a", "b"], vec![ret(add_(ident("a"), ident("b")))]),
                expr(call(ident("add"), vec![num(1.0), num(2.0)])),
            ]);
            b.iter(|| runtime.run_script(black_box(&script)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("recursive_fib_15", format!("{:?}", strategy)), &strategy, |b, &strategy| {
            let mut runtime = runtime(strategy);
            let script = Script::new(vec![fib(), expr(call(ident("fib"), vec![num(15.0)]))]);
            b.iter(|| runtime.run_script(black_box(&script)).unwrap())
        });
    }

    group.bench_function("host_to_script", |b| {
        let mut runtime = runtime(ExecutionStrategy::TreeWalk);
        runtime.run_script(&Script::new(vec![fib()])).unwrap();
        let fib = runtime.get_global("fib").unwrap();
        b.iter(|| runtime.call(&fib, Value::Undefined, vec![black_box(Value::from(10))]).unwrap())
    });

    group.finish();
}

/// Benchmark: Construction
fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("construct");

    let base = class("A", None).with_constructor(&["x"], vec![expr(assign_member(this(), "x", ident("x")))]);
    let derived = class("B", Some(ident("A")))
        .with_field("y", Some(num(2.0)))
        .with_constructor(&["x"], vec![expr(super_call(vec![ident("x")]))]);

    for strategy in STRATEGIES {
        group.bench_with_input(BenchmarkId::new("function", format!("{:?}", strategy)), &strategy, |b, &strategy| {
            let mut runtime = runtime(strategy);
            let script = Script::new(vec![
                function_declaration("P", &["x"], vec![expr(assign_member(this(), "x", ident("x")))]),
                expr(new_(ident("P"), vec![num(1.0)])),
            ]);
            b.iter(|| runtime.run_script(black_box(&script)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("derived_class", format!("{:?}", strategy)), &strategy, |b, &strategy| {
            let mut runtime = runtime(strategy);
            runtime
                .run_script(&Script::new(vec![class_declaration(base.clone()), class_declaration(derived.clone())]))
                .unwrap();
            let script = Script::new(vec![expr(new_(ident("B"), vec![num(1.0)]))]);
            b.iter(|| runtime.run_script(black_box(&script)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark: Compiling a function body
fn bench_compilation(c: &mut Criterion) {
    let node = function(
        "loop",
        &["n"],
        vec![
            var("i", Some(num(0.0))),
            var("sum", Some(num(0.0))),
            while_(
                lt(ident("i"), ident("n")),
                block(vec![
                    let_("sq", Some(mul_(ident("i"), ident("i")))),
                    expr(assign("sum", add_(ident("sum"), ident("sq")))),
                    expr(assign("i", add_(ident("i"), num(1.0)))),
                ]),
            ),
            ret(ident("sum")),
        ],
    );
    c.bench_function("compile_function_body", |b| {
        b.iter(|| Compiler::generate(black_box(&node), false).unwrap())
    });
}

criterion_group!(
    benches,
    bench_cold_start,
    bench_function_calls,
    bench_construct,
    bench_compilation,
);

criterion_main!(benches);
