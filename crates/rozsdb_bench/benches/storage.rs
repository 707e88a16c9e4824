//! Blob store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rozsdb_bench::random_data;
use rozsdb_storage::{BlobStore, FileBackend, InMemoryBackend};
use tempfile::TempDir;

/// Benchmark blob writes of increasing size.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_write");

    for size in [256, 4096, 65536].iter() {
        let data = random_data(*size);
        group.throughput(Throughput::Bytes(*size as u64));

        let dir = TempDir::new().unwrap();
        let file = FileBackend::open(dir.path()).unwrap();
        group.bench_with_input(BenchmarkId::new("file", size), &data, |b, data| {
            b.iter(|| file.write("blob", black_box(data)).unwrap());
        });

        let memory = InMemoryBackend::new();
        group.bench_with_input(BenchmarkId::new("memory", size), &data, |b, data| {
            b.iter(|| memory.write("blob", black_box(data)).unwrap());
        });
    }
    group.finish();
}

/// Benchmark the unchanged-content fast path used when saving caches.
fn bench_write_if_changed(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let file = FileBackend::open(dir.path()).unwrap();
    let data = random_data(4096);
    file.write("blob", &data).unwrap();

    c.bench_function("write_if_changed_unchanged", |b| {
        b.iter(|| black_box(file.write_if_changed("blob", &data).unwrap()));
    });
}

/// Benchmark hydrating a directory of blobs.
fn bench_read_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_all");

    for count in [100, 1000].iter() {
        let dir = TempDir::new().unwrap();
        let file = FileBackend::open(dir.path()).unwrap();
        for i in 0..*count {
            file.write(&format!("doc{i}"), &random_data(512)).unwrap();
        }

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(file.read_all(u64::MAX, &[]).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_write_if_changed, bench_read_all);
criterion_main!(benches);
