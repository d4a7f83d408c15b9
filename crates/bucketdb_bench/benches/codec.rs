//! Document codec benchmarks.

use bucketdb_bench::utils::random_document;
use bucketdb_codec::{DocumentCodec, DEFAULT_COMPRESSION_LEVEL};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let codec = DocumentCodec::new(DEFAULT_COMPRESSION_LEVEL);

    for size in [64, 1024, 16384].iter() {
        let doc = random_document(1, *size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| codec.encode(black_box(doc)).unwrap());
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = DocumentCodec::new(DEFAULT_COMPRESSION_LEVEL);

    for size in [64, 1024, 16384].iter() {
        let bytes = codec.encode(&random_document(1, *size)).unwrap();
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| codec.decode(black_box(bytes)).unwrap());
        });
    }
    group.finish();
}

/// Compression levels trade encode time for size.
fn bench_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_level");
    let doc = random_document(1, 4096);

    for level in [1, 3, 9, 19].iter() {
        let codec = DocumentCodec::new(*level);
        group.bench_with_input(BenchmarkId::from_parameter(level), &doc, |b, doc| {
            b.iter(|| codec.encode(black_box(doc)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_levels);
criterion_main!(benches);
