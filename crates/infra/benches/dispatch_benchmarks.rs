use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use topicbridge_core::{ChatThreadPair, GroupId, MessageIdPair, PeerChatId, ThreadId};
use topicbridge_infra::dispatch::{DispatchError, DispatchQueue, QueueConfig};
use topicbridge_infra::store::{InMemoryMappingStore, MappingStore};

/// Round trip of one typed job through an unthrottled queue.
fn bench_submit_latency(c: &mut Criterion) {
    let (queue, handle) = DispatchQueue::start(QueueConfig::default().with_name("bench-dispatch"))
        .expect("failed to start queue");

    let mut group = c.benchmark_group("submit_latency");
    group.sample_size(1000);
    group.bench_function("submit_ok", |b| {
        b.iter(|| {
            let value: Result<i64, DispatchError> = queue.submit(|| Ok(black_box(42)));
            black_box(value)
        });
    });
    group.finish();

    handle.shutdown();
}

/// Jobs per second with several submitters contending for one worker.
fn bench_contended_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_throughput");

    for submitters in [1usize, 4, 16].iter() {
        let jobs_per_submitter = 100usize;
        group.throughput(Throughput::Elements((submitters * jobs_per_submitter) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(submitters),
            submitters,
            |b, &submitters| {
                let (queue, handle) = DispatchQueue::start(QueueConfig::default())
                    .expect("failed to start queue");
                b.iter(|| {
                    let workers: Vec<_> = (0..submitters)
                        .map(|_| {
                            let queue = queue.clone();
                            thread::spawn(move || {
                                for i in 0..jobs_per_submitter {
                                    let _: Result<usize, DispatchError> =
                                        queue.submit(move || Ok(i));
                                }
                            })
                        })
                        .collect();
                    for w in workers {
                        let _ = w.join();
                    }
                });
                handle.shutdown();
            },
        );
    }

    group.finish();
}

/// Orphan sweep over a store where half the message pairings are orphaned.
fn bench_orphan_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("orphan_sweep");

    for messages in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*messages as u64));
        group.bench_with_input(BenchmarkId::from_parameter(messages), messages, |b, &messages| {
            b.iter_with_setup(
                || {
                    let store = Arc::new(InMemoryMappingStore::new());
                    let group_id = GroupId::new(100);
                    for t in 0..10i64 {
                        store
                            .save_chat_thread_pair(&ChatThreadPair::new(
                                PeerChatId::parse(format!("C{t}")).expect("valid chat id"),
                                group_id,
                                ThreadId::new(t * 2 + 2),
                            ))
                            .expect("save pairing");
                    }
                    for i in 0..messages {
                        store
                            .save_message_pair(&MessageIdPair {
                                tg_chat_id: group_id,
                                tg_thread_id: ThreadId::new((i % 20) as i64 + 2),
                                peer_chat_id: PeerChatId::parse("C0").expect("valid chat id"),
                                peer_message_id: format!("M{i}"),
                                tg_message_id: i as i64,
                            })
                            .expect("save message pairing");
                    }
                    store
                },
                |store| black_box(store.sweep_orphan_message_pairs()),
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_latency,
    bench_contended_throughput,
    bench_orphan_sweep
);
criterion_main!(benches);
