//! Throughput benchmarks for the parse+execute pipeline: one `criterion_group`
//! covering the common cases worth tracking (literal runs, alternation,
//! backtracking-heavy quantifiers, classes).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ecma_regexp::Program;

fn bench_literal(c: &mut Criterion) {
    let program = Program::compile("hello world", "").unwrap();
    c.bench_function("literal", |b| {
        b.iter(|| black_box(program.exec(black_box("say hello world to everyone"), 0)))
    });
}

fn bench_alternation(c: &mut Criterion) {
    let program = Program::compile("cat|dog|bird|fish|horse", "").unwrap();
    c.bench_function("alternation", |b| {
        b.iter(|| black_box(program.exec(black_box("the quick brown fox and the horse"), 0)))
    });
}

fn bench_quantifier_backtracking(c: &mut Criterion) {
    let program = Program::compile("(a+)+b", "").unwrap();
    c.bench_function("quantifier_backtracking", |b| {
        b.iter(|| black_box(program.exec(black_box("aaaaaaaaaaaaaaaaaaaaaaaaac"), 0)))
    });
}

fn bench_character_class(c: &mut Criterion) {
    let program = Program::compile(r"[a-zA-Z0-9_]+@[a-zA-Z0-9_.]+", "").unwrap();
    c.bench_function("character_class", |b| {
        b.iter(|| black_box(program.exec(black_box("contact us at support@example.com please"), 0)))
    });
}

fn bench_named_captures(c: &mut Criterion) {
    let program = Program::compile(r"(?<year>\d{4})-(?<month>\d{2})-(?<day>\d{2})", "").unwrap();
    c.bench_function("named_captures", |b| {
        b.iter(|| black_box(program.exec(black_box("event on 2024-11-07 at noon"), 0)))
    });
}

criterion_group!(
    benches,
    bench_literal,
    bench_alternation,
    bench_quantifier_backtracking,
    bench_character_class,
    bench_named_captures
);
criterion_main!(benches);
