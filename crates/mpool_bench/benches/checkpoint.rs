//! Checkpoint and file flush benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use mpool_bench::utils::{dirty, logged_pool, memory_file, random_data, shuffled_pages, BENCH_PAGE_SIZE};
use mpool_core::{Lsn, SyncStatus};

/// Benchmark a checkpoint over a fully dirty cache.
fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint");
    let data = random_data(BENCH_PAGE_SIZE);

    for dirty_pages in [64u32, 512, 2048].iter() {
        group.throughput(Throughput::Elements(*dirty_pages as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(dirty_pages),
            dirty_pages,
            |b, &dirty_pages| {
                let pool = logged_pool(4, dirty_pages as usize);
                let file = memory_file(&pool, "bench.db");
                let pages = shuffled_pages(dirty_pages);
                let mut next = 0u32;

                b.iter_batched(
                    || {
                        dirty(&pool, &file, &pages, &data);
                        next += 1;
                        Lsn::new(1, next)
                    },
                    |mut lsn| {
                        let status = pool.sync(Some(&mut lsn)).unwrap();
                        black_box(status);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark a checkpoint where only a fraction of a large cache is dirty.
fn bench_sparse_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_checkpoint");
    let data = random_data(BENCH_PAGE_SIZE);

    for percent in [1u32, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(percent), percent, |b, &percent| {
            let pool = logged_pool(4, 1024);
            let file = memory_file(&pool, "bench.db");
            let all = shuffled_pages(4096);
            dirty(&pool, &file, &all, &data);
            pool.sync(None).unwrap();

            let hot: Vec<_> = all.iter().copied().take((4096 * percent / 100) as usize).collect();
            b.iter_batched(
                || dirty(&pool, &file, &hot, &data),
                |()| {
                    let status = pool.sync(None).unwrap();
                    black_box(status);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Benchmark repeated checkpoints that are answered without writing.
fn bench_progress_query(c: &mut Criterion) {
    let pool = logged_pool(4, 256);
    let file = memory_file(&pool, "bench.db");
    dirty(&pool, &file, &shuffled_pages(512), &random_data(BENCH_PAGE_SIZE));
    let mut lsn = Lsn::new(1, 100);
    assert_eq!(pool.sync(Some(&mut lsn)).unwrap(), SyncStatus::Complete);

    c.bench_function("progress_query", |b| {
        b.iter(|| {
            let mut lsn = Lsn::new(1, 50);
            black_box(pool.sync(Some(&mut lsn)).unwrap());
        });
    });
}

/// Benchmark flushing one of several files.
fn bench_sync_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_file");
    let data = random_data(BENCH_PAGE_SIZE);

    for files in [1usize, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(files), files, |b, &files| {
            let pool = logged_pool(4, 64 * files);
            let handles: Vec<_> = (0..files)
                .map(|i| memory_file(&pool, &format!("bench{i}.db")))
                .collect();
            let pages = shuffled_pages(128);

            b.iter_batched(
                || {
                    for file in &handles {
                        dirty(&pool, file, &pages, &data);
                    }
                },
                |()| {
                    let status = pool.sync_file(&handles[0]).unwrap();
                    black_box(status);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_checkpoint,
    bench_sparse_checkpoint,
    bench_progress_query,
    bench_sync_file
);

criterion_main!(benches);
