//! Store read and flush benchmarks.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use mediumstore_core::{Medium, MediumAccess, MediumConfig, Store};
use tempfile::TempDir;

/// Create patterned data of given size.
fn patterned_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

fn memory_store(size: usize, config: MediumConfig) -> Store {
    let medium = Medium::memory(patterned_data(size), MediumAccess::ReadWrite, config).unwrap();
    let mut store = Store::new(medium);
    store.open().unwrap();
    store
}

/// Benchmark reads served from the cache.
fn bench_cached_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_read");

    for size in [64, 1024, 8192].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut store = memory_store(size, MediumConfig::default());
            let start = store.create_medium_offset(0).unwrap();
            store.cache(start, size).unwrap();

            b.iter(|| {
                let data = store.get_data(black_box(start), black_box(size)).unwrap();
                black_box(data);
            });
        });
    }

    group.finish();
}

/// Benchmark reads that always reach the medium.
fn bench_uncached_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncached_read");

    for size in [64, 1024, 8192].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let config = MediumConfig::new().caching_enabled(false);
            let mut store = memory_store(size, config);
            let start = store.create_medium_offset(0).unwrap();

            b.iter(|| {
                let data = store.get_data(black_box(start), black_box(size)).unwrap();
                black_box(data);
            });
        });
    }

    group.finish();
}

/// Benchmark file reads with a cache too small to hold the whole file.
fn bench_file_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_read");

    // Use larger sample size for file operations
    group.sample_size(50);

    for size in [4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("bench.dat");
            std::fs::write(&path, patterned_data(size)).unwrap();

            let config = MediumConfig::new()
                .max_cache_size(1024)
                .max_cache_region_size(256)
                .max_read_write_block_size(512);
            let mut store =
                Store::new(Medium::file(&path, MediumAccess::ReadOnly, config).unwrap());
            store.open().unwrap();
            let start = store.create_medium_offset(0).unwrap();

            b.iter(|| {
                let data = store.get_data(black_box(start), black_box(size)).unwrap();
                black_box(data);
            });
        });
    }

    group.finish();
}

/// Benchmark flushing scattered edits.
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");

    for edits in [1, 16, 128].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(edits), edits, |b, &edits| {
            let size = 64 * 1024;
            let stride = (size / edits) as u64;

            b.iter_batched(
                || {
                    let mut store = memory_store(size, MediumConfig::default());
                    for i in 0..edits as u64 {
                        let at = store.create_medium_offset(i * stride).unwrap();
                        if i % 2 == 0 {
                            store.insert_data(at, vec![0xAB; 7]).unwrap();
                        } else {
                            store.remove_data(at, 5).unwrap();
                        }
                    }
                    store
                },
                |mut store| {
                    store.flush().unwrap();
                    black_box(store);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cached_read,
    bench_uncached_read,
    bench_file_read,
    bench_flush,
);

criterion_main!(benches);
