//! Benchmarks for the matchmaking grouping pass

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scrim_room::config::MatchmakingSettings;
use scrim_room::matchmaker::{MatchComposer, MmrBandComposer};
use scrim_room::queue::{QueueEntry, QueueStore};
use scrim_room::utils::current_timestamp;

/// Deterministic pseudo-spread of ratings across the ladder
fn pool_of(size: usize) -> Vec<QueueEntry> {
    let mut store = QueueStore::new();
    let now = current_timestamp();
    for i in 0..size {
        let mmr = 800 + ((i * 211) % 1400) as i32;
        store
            .insert_waiting(format!("player{}", i), mmr, now, Duration::minutes(30))
            .unwrap();
    }
    store.list_waiting(now)
}

fn bench_compose(c: &mut Criterion) {
    let composer = MmrBandComposer::new();
    let settings = MatchmakingSettings::default();

    let mut group = c.benchmark_group("compose");
    for size in [8, 64, 512, 4096] {
        let waiting = pool_of(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &waiting, |b, waiting| {
            b.iter(|| composer.compose(black_box(waiting), black_box(&settings)));
        });
    }
    group.finish();
}

fn bench_queue_listing(c: &mut Criterion) {
    let now = current_timestamp();
    let mut store = QueueStore::new();
    for i in 0..1024 {
        let mmr = 800 + ((i * 211) % 1400) as i32;
        store
            .insert_waiting(format!("player{}", i), mmr, now, Duration::minutes(30))
            .unwrap();
    }

    c.bench_function("list_waiting_1024", |b| {
        b.iter(|| black_box(store.list_waiting(now)).len());
    });
}

criterion_group!(benches, bench_compose, bench_queue_listing);
criterion_main!(benches);
