//! Criterion benchmarks for matrix construction fan-out.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nodelet_bench::bench_scheduler;
use nodelet_matrix::{DistributedMatrix, MatrixConfig};

/// Benchmark: create a 1K-row matrix across 1, 4, 8 and 16 partitions.
fn bench_create_1k(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_create_1k");
    for partitions in [1usize, 4, 8, 16] {
        let sched = bench_scheduler(partitions).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(partitions), &partitions, |b, _| {
            let mut ctx = sched.root();
            b.iter(|| {
                let m = DistributedMatrix::create(&mut ctx, 1024).unwrap();
                black_box(m.rows_per_partition());
            });
        });
    }
    group.finish();
}

/// Benchmark: create with a 16-entry reservation per row on 8 partitions.
fn bench_create_reserved(c: &mut Criterion) {
    let sched = bench_scheduler(8).unwrap();
    let config = MatrixConfig::with_row_reserve(16);
    c.bench_function("matrix_create_1k_reserved", |b| {
        let mut ctx = sched.root();
        b.iter(|| {
            let m = DistributedMatrix::create_with(&mut ctx, 1024, &config).unwrap();
            black_box(m.nrows());
        });
    });
}

criterion_group!(benches, bench_create_1k, bench_create_reserved);
criterion_main!(benches);
