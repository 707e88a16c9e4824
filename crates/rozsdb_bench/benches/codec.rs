//! Compression and document benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rozsdb_bench::random_document;
use rozsdb_codec::{compress, decompress, values_match, Document, DocumentBuilder, Value};

/// Benchmark compressing documents of increasing size.
fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");

    for fields in [4, 32, 256].iter() {
        let json = random_document(0, *fields, 16);
        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &json, |b, json| {
            b.iter(|| black_box(compress(black_box(json.as_bytes())).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark decompressing the same documents.
fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");

    for fields in [4, 32, 256].iter() {
        let json = random_document(0, *fields, 16);
        let frame = compress(json.as_bytes()).unwrap();
        group.throughput(Throughput::Bytes(json.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &frame, |b, frame| {
            b.iter(|| black_box(decompress(black_box(frame)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark building a stored frame from request JSON.
fn bench_build_frame(c: &mut Criterion) {
    let json = random_document(7, 16, 16);
    c.bench_function("build_frame", |b| {
        b.iter(|| {
            let doc = DocumentBuilder::from_json(black_box(&json))
                .unwrap()
                .with_id("abcdefghijkl")
                .build();
            black_box(doc.to_frame().unwrap())
        });
    });
}

/// Benchmark the per-candidate work of a find: decompress, parse, compare.
fn bench_match(c: &mut Criterion) {
    let json = random_document(7, 16, 16);
    let frame = DocumentBuilder::from_json(&json)
        .unwrap()
        .with_id("abcdefghijkl")
        .build()
        .to_frame()
        .unwrap();
    let target = Value::from("7");

    c.bench_function("match_candidate", |b| {
        b.iter(|| {
            let doc = Document::from_frame(black_box(&frame)).unwrap();
            black_box(doc.get("index").is_some_and(|v| values_match(v, &target)))
        });
    });
}

criterion_group!(
    benches,
    bench_compress,
    bench_decompress,
    bench_build_frame,
    bench_match
);
criterion_main!(benches);
