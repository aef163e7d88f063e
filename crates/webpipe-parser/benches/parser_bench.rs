//! Parser performance benchmarks.
//!
//! Run with: cargo bench -p webpipe-parser

#![allow(missing_docs)]

use std::fmt::Write;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use webpipe_parser::parse;

/// Generate a synthetic webpipe file with N routes, each backed by a named
/// pipeline and a variable.
fn generate_document(num_routes: usize) -> String {
    let mut doc = String::from(
        "config pg {\n  host: $DB_HOST || \"localhost\"\n  port: 5432\n  ssl: false\n}\n\n",
    );

    for i in 0..num_routes {
        let _ = write!(
            doc,
            "pg findItem{i} = `SELECT * FROM items WHERE id = $1`\n\n\
             pipeline loadItem{i} =\n  \
             |> jq: `{{ sqlParams: [.params.id] }}`\n  \
             |> pg: findItem{i}\n  \
             |> result\n    \
             ok(200):\n      |> jq: `.data.rows[0]`\n    \
             notFound(404):\n      |> jq: `{{ error: \"missing\" }}`\n\n\
             GET /items{i}/:id\n  |> pipeline: loadItem{i}\n\n"
        );
    }

    doc
}

fn bench_parse_small(c: &mut Criterion) {
    let doc = generate_document(10);
    let bytes = doc.len();

    let mut group = c.benchmark_group("parse_small");
    group.throughput(Throughput::Bytes(bytes as u64));

    group.bench_function("10_routes", |b| {
        b.iter(|| parse(black_box(&doc)));
    });

    group.finish();
}

fn bench_parse_large(c: &mut Criterion) {
    let doc = generate_document(1000);
    let bytes = doc.len();

    let mut group = c.benchmark_group("parse_large");
    group.throughput(Throughput::Bytes(bytes as u64));

    group.bench_function("1000_routes", |b| {
        b.iter(|| parse(black_box(&doc)));
    });

    group.finish();
}

fn bench_parse_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_scaling");

    for size in [10, 50, 100, 500, 1000] {
        let doc = generate_document(size);
        group.throughput(Throughput::Bytes(doc.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| parse(black_box(doc)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_small,
    bench_parse_large,
    bench_parse_scaling
);
criterion_main!(benches);
