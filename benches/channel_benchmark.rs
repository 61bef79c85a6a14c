/*!
 * Channel Benchmarks
 *
 * Uncontended enqueue/dequeue cost and producer/consumer throughput across
 * capacities
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flight_pipeline::channel::Channel;
use std::thread;
use std::time::Duration;

const MESSAGES: u64 = 10_000;

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");

    let channel: Channel<u64> = Channel::bounded("bench", 1);
    group.bench_function("try_enqueue_try_dequeue", |b| {
        b.iter(|| {
            channel.try_enqueue(black_box(42)).ok();
            black_box(channel.try_dequeue().ok());
        });
    });

    group.bench_function("stats", |b| {
        b.iter(|| black_box(channel.stats()));
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_throughput");
    group.throughput(Throughput::Elements(MESSAGES));
    group.sample_size(20);

    for capacity in [1usize, 10, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let channel: Channel<u64> = Channel::bounded("spsc", capacity);
                    let producer_channel = channel.clone();
                    let producer = thread::spawn(move || {
                        for i in 0..MESSAGES {
                            producer_channel.enqueue(i).ok();
                        }
                    });

                    for _ in 0..MESSAGES {
                        black_box(channel.dequeue(Some(Duration::from_secs(1))).ok());
                    }
                    producer.join().unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for resident in [10usize, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(resident),
            &resident,
            |b, &resident| {
                let channel: Channel<u64> = Channel::unbounded("drain");
                b.iter(|| {
                    for i in 0..resident as u64 {
                        channel.try_enqueue(i).ok();
                    }
                    black_box(channel.drain());
                    channel.reopen();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_throughput, bench_drain);
criterion_main!(benches);
