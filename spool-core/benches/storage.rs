//! Benchmarks for Spool storage operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use spool_core::{FileStorage, Record, Storage};
use tempfile::TempDir;

fn bench_put(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path().join("bench.spool")).unwrap();
    let mut i = 0u64;

    c.bench_function("put_append", |b| {
        b.iter(|| {
            i += 1;
            storage
                .put(Record::new(i.to_le_bytes().to_vec(), vec![0u8; 128]))
                .unwrap();
        })
    });
}

fn bench_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::open(dir.path().join("bench.spool")).unwrap();
    for i in 0..1000u64 {
        storage
            .put(Record::new(i.to_le_bytes().to_vec(), vec![0u8; 128]))
            .unwrap();
    }

    let mut i = 0u64;
    c.bench_function("get_indexed", |b| {
        b.iter(|| {
            i = (i + 1) % 1000;
            storage.get(&i.to_le_bytes()).unwrap().unwrap();
        })
    });
}

fn bench_remove_first(c: &mut Criterion) {
    // Worst case for compaction: every byte after the removed record moves.
    c.bench_function("remove_first_of_1000", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let storage = FileStorage::open(dir.path().join("bench.spool")).unwrap();
                for i in 0..1000u64 {
                    storage
                        .put(Record::new(i.to_le_bytes().to_vec(), vec![0u8; 128]))
                        .unwrap();
                }
                (dir, storage)
            },
            |(_dir, storage)| {
                storage.remove(&0u64.to_le_bytes()).unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_put, bench_get, bench_remove_first);
criterion_main!(benches);
