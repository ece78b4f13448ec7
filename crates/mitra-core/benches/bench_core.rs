// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BENCHMARK SUITE — mitra-core
//
// Chain hashing, full-history verification, and coordinator round trips
// against the in-memory store.
// Run: cargo bench -p mitra-core
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mitra_core::{
    next_hash, AccountId, LedgerPolicy, ManualClock, MemoryStore, TransactionCoordinator,
    GENESIS_HASH,
};

const T0: i64 = 1_760_000_000_000;

fn coordinator() -> (TransactionCoordinator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_millis(T0));
    let policy = LedgerPolicy {
        retry_backoff: Duration::ZERO,
        ..LedgerPolicy::default()
    };
    (
        TransactionCoordinator::new(Arc::new(MemoryStore::new()), clock.clone(), policy),
        clock,
    )
}

// ─────────────────────────────────────────────────────────────────
// CHAIN
// ─────────────────────────────────────────────────────────────────

fn bench_next_hash(c: &mut Criterion) {
    c.bench_function("chain/next_hash", |b| {
        b.iter(|| {
            black_box(next_hash(
                black_box(GENESIS_HASH),
                black_box("SCH-42"),
                black_box("PM Scholarship"),
                black_box(T0),
            ))
        })
    });
}

fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain/verify");
    for size in [10usize, 100, 1_000] {
        let (coord, clock) = coordinator();
        let id = AccountId::new("bench-user").unwrap();
        for i in 0..size {
            clock.advance_millis(1);
            coord
                .apply_scheme(&id, &format!("SCH-{}", i), "Benchmark scheme")
                .unwrap();
        }
        let ledger = coord.account(&id).unwrap().account.ledger().clone();
        group.bench_with_input(BenchmarkId::from_parameter(size), &ledger, |b, ledger| {
            b.iter(|| black_box(ledger.verify()))
        });
    }
    group.finish();
}

// ─────────────────────────────────────────────────────────────────
// COORDINATOR
// ─────────────────────────────────────────────────────────────────

fn bench_apply_scheme(c: &mut Criterion) {
    let (coord, clock) = coordinator();
    let id = AccountId::new("bench-user").unwrap();
    let mut n = 0u64;
    c.bench_function("coordinator/apply_scheme", |b| {
        b.iter(|| {
            n += 1;
            clock.advance_millis(1);
            black_box(coord.apply_scheme(&id, &format!("SCH-{}", n), "Benchmark scheme"))
        })
    });
}

fn bench_reward_tokens(c: &mut Criterion) {
    let (coord, _) = coordinator();
    let id = AccountId::new("bench-user").unwrap();
    c.bench_function("coordinator/reward_tokens", |b| {
        b.iter(|| black_box(coord.reward_tokens(&id, 1, "bench")))
    });
}

criterion_group!(
    benches,
    bench_next_hash,
    bench_verify,
    bench_apply_scheme,
    bench_reward_tokens
);
criterion_main!(benches);
