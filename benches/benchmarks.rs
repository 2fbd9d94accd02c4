use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use spellkit::{
    Channel, Computed, Lens, MemoryStorage, PersistOptions, Persisted, Readable, Store, Writable,
};

fn store_creation_benchmark(c: &mut Criterion) {
    c.bench_function("store_creation", |b| {
        b.iter(|| {
            let store: Store<i32> = Store::new(black_box(42));
            store
        });
    });
}

fn store_read_benchmark(c: &mut Criterion) {
    let store: Store<i32> = Store::new(42);

    c.bench_function("store_read", |b| {
        b.iter(|| {
            black_box(store.unwrap());
        });
    });
}

fn store_publish_benchmark(c: &mut Criterion) {
    let store: Store<i32> = Store::new(0);

    c.bench_function("store_publish", |b| {
        let mut i = 0;
        b.iter(|| {
            store.publish(black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn channel_fanout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_fanout");

    for subscriber_count in [1, 10, 100].iter() {
        let channel: Channel<usize> = Channel::new();

        for _ in 0..*subscriber_count {
            channel
                .subscribe(|value| {
                    black_box(value);
                })
                .unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    channel.publish(black_box(i)).unwrap();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn computed_recompute_benchmark(c: &mut Criterion) {
    let a: Store<i32> = Store::new(5);
    let b: Store<i32> = Store::new(10);
    let sum = Computed::new((a.clone(), b.clone()), |(a, b)| a + b).unwrap();

    c.bench_function("computed_recompute", |bench| {
        let mut i = 0;
        bench.iter(|| {
            a.publish(black_box(i)).unwrap();
            black_box(sum.unwrap());
            i += 1;
        });
    });
}

fn lens_publish_benchmark(c: &mut Criterion) {
    #[derive(Clone)]
    struct State {
        counter: usize,
    }

    let store = Store::new(State { counter: 0 });
    let counter = Lens::field(store, |s| &s.counter, |s| &mut s.counter);

    c.bench_function("lens_publish", |b| {
        let mut i = 0;
        b.iter(|| {
            counter.publish(black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn persisted_publish_benchmark(c: &mut Criterion) {
    let persisted = Persisted::new(
        Store::new(vec![0u32; 16]),
        PersistOptions::new().key("bench").storage(MemoryStorage::new()),
    );

    c.bench_function("persisted_publish", |b| {
        let mut i = 0;
        b.iter(|| {
            persisted.publish(vec![black_box(i); 16]).unwrap();
            i += 1;
        });
    });
}

criterion_group!(
    benches,
    store_creation_benchmark,
    store_read_benchmark,
    store_publish_benchmark,
    channel_fanout_benchmark,
    computed_recompute_benchmark,
    lens_publish_benchmark,
    persisted_publish_benchmark,
);
criterion_main!(benches);
