//! Benchmarks for the priority ordering store and task submission.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::tasks::{
    PriorityStore, SchedulerConfig, SubmitOptions, TaskPriority, TaskScheduler, TaskWork,
};

const PRIORITIES: [TaskPriority; 5] = [
    TaskPriority::Critical,
    TaskPriority::High,
    TaskPriority::Normal,
    TaskPriority::Low,
    TaskPriority::Background,
];

type Item = (u8, u64);

fn bench_store_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_push_pop");
    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                let mut store: PriorityStore<Item, Item> = PriorityStore::unbounded(|item| *item);
                for seq in 0..n as u64 {
                    store.push_unbounded((PRIORITIES[seq as usize % 5].rank(), seq));
                }
                while let Some(item) = store.pop_highest() {
                    black_box(item);
                }
            });
        });
    }
    group.finish();
}

fn bench_store_remove_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_remove_where");
    for size in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                let mut store: PriorityStore<Item, Item> = PriorityStore::unbounded(|item| *item);
                for seq in 0..n as u64 {
                    store.push_unbounded(((seq % 5) as u8, seq));
                }
                black_box(store.remove_where(|item| item.1 == n as u64 / 2))
            });
        });
    }
    group.finish();
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_submit");
    for batch in [100usize, 1_000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &n| {
            b.iter(|| {
                let config = SchedulerConfig::default().with_max_queue_size(0);
                let scheduler = TaskScheduler::new(config).unwrap();
                for i in 0..n {
                    let work = TaskWork::from_fn("bench", || async { Ok(serde_json::Value::Null) });
                    let options = SubmitOptions::new().priority(PRIORITIES[i % 5]);
                    black_box(scheduler.submit(work, options).unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_drain");
    group.sample_size(10);
    let runtime = tokio::runtime::Runtime::new().unwrap();
    for workers in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(500));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.to_async(&runtime).iter(|| async move {
                let config = SchedulerConfig::default()
                    .with_max_workers(w)
                    .with_max_queue_size(0)
                    .with_poll_interval(Duration::from_millis(1));
                let scheduler = Arc::new(TaskScheduler::new(config).unwrap());
                for _ in 0..500 {
                    scheduler
                        .submit_fn("noop", || async { Ok(serde_json::Value::Null) })
                        .unwrap();
                }
                scheduler.start();
                black_box(scheduler.stop(true, Duration::from_secs(30)).await)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_store_push_pop,
    bench_store_remove_where,
    bench_submit,
    bench_drain
);
criterion_main!(benches);
