use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use hamt_persistent::{bitmap::Branch64, Builder, Map};
use std::hint::black_box;

const SIZE: u64 = 10_000;

fn map() -> Map<u64, u64> {
    (0..SIZE).map(|key| (key, key)).collect()
}

fn assign(criterion: &mut Criterion) {
    criterion.bench_function("assign", |bencher| {
        bencher.iter(|| {
            let mut map = Map::new();

            for key in 0..SIZE {
                map = map.assign(black_box(key), key);
            }

            map
        })
    });

    criterion.bench_function("assign 64-way", |bencher| {
        bencher.iter(|| {
            let mut map = Map::<u64, u64, Branch64>::with_branching();

            for key in 0..SIZE {
                map = map.assign(black_box(key), key);
            }

            map
        })
    });
}

fn build(criterion: &mut Criterion) {
    criterion.bench_function("build", |bencher| {
        bencher.iter(|| {
            let mut builder = Builder::new();

            for key in 0..SIZE {
                builder.add(black_box(key), key);
            }

            builder.build()
        })
    });
}

fn find(criterion: &mut Criterion) {
    let map = map();

    criterion.bench_function("find", |bencher| {
        bencher.iter(|| {
            for key in 0..SIZE {
                black_box(map.find(&key));
            }
        })
    });
}

fn delete(criterion: &mut Criterion) {
    criterion.bench_function("delete", |bencher| {
        bencher.iter_batched(
            map,
            |mut map| {
                for key in 0..SIZE {
                    map = map.delete(black_box(&key));
                }

                map
            },
            BatchSize::SmallInput,
        )
    });
}

fn iterate(criterion: &mut Criterion) {
    let map = map();

    criterion.bench_function("iterate", |bencher| {
        bencher.iter(|| map.iter().map(|(_, value)| black_box(*value)).sum::<u64>())
    });
}

criterion_group!(benches, assign, build, find, delete, iterate);
criterion_main!(benches);
