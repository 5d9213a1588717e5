use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use amq_filters::cuckoo::CuckooFilter;

fn bench_insert(c: &mut Criterion) {
    let mut initial_items = 0;
    while initial_items < 1024 - 32 {
        c.bench_function(&format!("cuckoo insert {}", initial_items), |b| {
            b.iter_batched_ref(
                || {
                    let mut filter = CuckooFilter::<u32>::new(256, 4).unwrap();
                    for i in 0..initial_items {
                        filter.insert(&i);
                    }
                    filter
                },
                |filter| filter.insert(&0xDEAD_BEEF),
                BatchSize::PerIteration,
            )
        });
        initial_items += 32;
    }
}

fn bench_contains(c: &mut Criterion) {
    let mut filter = CuckooFilter::<u32>::new(256, 4).unwrap();
    for i in 0..768 {
        filter.insert(&i);
    }
    c.bench_function("cuckoo contains", |b| b.iter(|| filter.contains(&0xDEAD_BEEF)));
}

criterion_group!(benches, bench_insert, bench_contains);
criterion_main!(benches);
