//! Benchmarks for the compiler and the bytecode VM.

use std::fs;
use std::io;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loxvm::vm::Vm;

/// Compile and run on a fresh VM, discarding printed output.
fn run_vm(source: &str) {
    let mut vm = Vm::new().with_output(io::sink());
    vm.interpret(source).expect("vm runtime error");
}

fn load_program(name: &str) -> String {
    let path = format!("benches/programs/{}.lox", name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("failed to read {}", path))
}

fn programs(c: &mut Criterion) {
    let mut group = c.benchmark_group("programs");

    for name in ["fib_recursive", "loop_sum", "classes"] {
        let source = load_program(name);
        group.bench_with_input(BenchmarkId::new("vm", name), &source, |b, src| {
            b.iter(|| run_vm(black_box(src)))
        });
    }

    group.finish();
}

fn fib_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_scaling");

    for n in [10, 15, 20].iter() {
        let source = format!(
            r#"
fun fib(n) {{
  if (n < 2) return n;
  return fib(n - 1) + fib(n - 2);
}}
var result = fib({});
"#,
            n
        );

        group.bench_with_input(BenchmarkId::new("vm", n), &source, |b, src| {
            b.iter(|| run_vm(black_box(src)))
        });
    }

    group.finish();
}

/// Benchmark compilation time alone (not execution).
fn compilation_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation_overhead");

    let source = load_program("fib_recursive");
    group.bench_function("compile_fib", |b| {
        b.iter(|| loxvm::compile(black_box(&source)).expect("compile error"))
    });

    let source = load_program("classes");
    group.bench_function("compile_classes", |b| {
        b.iter(|| loxvm::compile(black_box(&source)).expect("compile error"))
    });

    group.finish();
}

criterion_group!(benches, programs, fib_scaling, compilation_overhead);

criterion_main!(benches);
