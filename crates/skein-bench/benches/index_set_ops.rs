//! Criterion micro-benchmarks for index set publication and reads.

use std::hint::black_box;
use std::sync::atomic::Ordering;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use skein_bench::populated_index_set;

fn bench_update_indexes(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_set_update");
    for live in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(live), &live, |b, &live| {
            let mut set = populated_index_set(8192, live);
            b.iter(|| {
                set.update_indexes();
                black_box(set.current_epoch())
            });
        });
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    c.bench_function("index_set_allocate_free_publish", |b| {
        let mut set = populated_index_set(1024, 128);
        b.iter(|| {
            let index = set.allocate_item();
            set.make_item_valid(index);
            set.update_indexes();
            set.free_item(index);
            set.update_indexes();
        });
    });
}

fn bench_reader_snapshot(c: &mut Criterion) {
    let set = populated_index_set(8192, 1024);
    let reader = set.reader();
    c.bench_function("index_set_reader_sum_1024", |b| {
        b.iter(|| {
            let snapshot = reader.valid_indexes();
            let sum: u64 = snapshot
                .iter()
                .map(|&i| reader.get(i).load(Ordering::Relaxed))
                .sum();
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_update_indexes, bench_churn, bench_reader_snapshot);
criterion_main!(benches);
