//! Database operation benchmarks.

use bucketdb_bench::utils::{key, populate, random_document};
use bucketdb_core::Db;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

/// Benchmark one-shot puts, each its own transaction.
fn bench_single_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_write");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let db = Db::open_in_memory();
            let doc = random_document(0, size);
            let mut i = 0usize;

            b.iter(|| {
                db.put("bench", &key(i), black_box(&doc)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

/// Benchmark many puts inside a single transaction.
fn bench_batch_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_write");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = Db::open_in_memory();
                let docs: Vec<_> = (0..batch_size).map(|i| random_document(i, 256)).collect();

                b.iter(|| {
                    db.update(|tx| {
                        for (i, doc) in docs.iter().enumerate() {
                            tx.put("bench.nested", &key(i), black_box(doc))?;
                        }
                        Ok(())
                    })
                    .unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark durable commits against a file.
fn bench_file_commit(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&dir.path().join("bench.db")).unwrap();
    let doc = random_document(0, 256);
    let mut i = 0usize;

    c.bench_function("file_commit", |b| {
        b.iter(|| {
            db.put("bench", &key(i), black_box(&doc)).unwrap();
            i += 1;
        });
    });
}

/// Benchmark point reads.
fn bench_single_read(c: &mut Criterion) {
    let db = Db::open_in_memory();
    populate(&db, "bench", 1000, 256);

    c.bench_function("single_read", |b| {
        let mut i = 0usize;
        b.iter(|| {
            black_box(db.get("bench", &key(i % 1000)).unwrap());
            i += 1;
        });
    });
}

/// Benchmark full, prefix and filtered scans.
fn bench_scans(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for count in [100, 1000, 10000].iter() {
        let db = Db::open_in_memory();
        populate(&db, "bench", *count, 128);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("all", count), count, |b, _| {
            b.iter(|| black_box(db.all("bench").unwrap().count()));
        });
        group.bench_with_input(BenchmarkId::new("prefix", count), count, |b, _| {
            b.iter(|| black_box(db.prefix("bench", "00000").unwrap().count()));
        });
        group.bench_with_input(BenchmarkId::new("find", count), count, |b, _| {
            b.iter(|| black_box(db.find("bench", ".score >= 500").unwrap().count()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_write,
    bench_batch_write,
    bench_file_commit,
    bench_single_read,
    bench_scans,
);
criterion_main!(benches);
