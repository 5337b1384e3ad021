//! Throughput benchmarks: Cortado vs Moka, plus raw timer-wheel costs.
//!
//! Each cache group benchmarks the same TTL workload against both caches so
//! criterion can generate side-by-side HTML reports; the wheel group
//! measures the scheduling core in isolation.
//!
//! Run with:
//!     cargo bench --bench throughput

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use moka::sync::Cache as MokaCache;

use cortado::expiry::timer_wheel::TimerWheel;
use cortado::CacheBuilder;

/// Number of entries each cache is pre-filled with.
const CAP: u64 = 10_000;

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

const TTL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Group 1: get_hit_ttl
// ---------------------------------------------------------------------------
// All keys are present and fresh → measures read throughput including the
// inline deadline check.

fn bench_get_hit_ttl(c: &mut Criterion) {
    let cortado: cortado::Cache<u64, u64> = CacheBuilder::new().time_to_live(TTL).build();
    for i in 0..CAP {
        cortado.insert(i, i * 2);
    }

    let moka: MokaCache<u64, u64> = MokaCache::builder().time_to_live(TTL).build();
    for i in 0..CAP {
        moka.insert(i, i * 2);
    }

    let mut group = c.benchmark_group("get_hit_ttl");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("cortado", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(cortado.get(black_box(&i)));
            }
        })
    });

    group.bench_function("moka", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(moka.get(black_box(&i)));
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: insert_ttl
// ---------------------------------------------------------------------------
// Sequential inserts of always-new keys, every one scheduling a deadline.

fn bench_insert_ttl(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_ttl");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("cortado", |b| {
        let cache: cortado::Cache<u64, u64> = CacheBuilder::new().time_to_live(TTL).build();
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.insert(black_box(key), black_box(key));
                key = key.wrapping_add(1);
            }
        })
    });

    group.bench_function("moka", |b| {
        let cache: MokaCache<u64, u64> = MokaCache::builder().time_to_live(TTL).build();
        let mut key = 0u64;
        b.iter(|| {
            for _ in 0..OPS {
                cache.insert(black_box(key), black_box(key));
                key = key.wrapping_add(1);
            }
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: wheel_ops (the scheduling core in isolation)
// ---------------------------------------------------------------------------

fn bench_wheel_ops(c: &mut Criterion) {
    const S: u64 = 1_000_000_000;
    const MS: u64 = 1_000_000;

    let mut group = c.benchmark_group("wheel_ops");
    group.throughput(Throughput::Elements(OPS));

    // Rescheduling churn over a populated wheel.
    group.bench_function("schedule_reschedule", |b| {
        let mut wheel: TimerWheel<u64> = TimerWheel::new(0);
        for i in 0..CAP {
            wheel.schedule(i, (i % 300 + 1) * S);
        }
        let mut deadline = 300 * S;
        b.iter(|| {
            for i in 0..OPS {
                deadline += MS;
                wheel.schedule(black_box(i % CAP), black_box(deadline));
            }
        })
    });

    // Steady-state sweeping: one schedule and one 1 ms advance per element.
    group.bench_function("advance_steady_state", |b| {
        let mut wheel: TimerWheel<u64> = TimerWheel::new(0);
        let mut now = 0u64;
        for i in 0..CAP {
            wheel.schedule(i, (i % 300 + 1) * S);
        }
        b.iter(|| {
            for i in 0..OPS {
                now += MS;
                wheel.schedule(i % CAP, now + 50 * MS);
                wheel.advance(now, |key, _| {
                    black_box(key);
                    true
                });
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_get_hit_ttl, bench_insert_ttl, bench_wheel_ops);
criterion_main!(benches);
