// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS — mitra-core
//
// - Any operation sequence leaves a verifiable chain and the modelled balance
// - Re-applying a scheme never changes the account
// - Editing any stored field of any entry is detected
// - Concurrent writers on one account never lose an update
//
// Run: cargo test --release -p mitra-core --test prop_core
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mitra_core::{
    AccountId, Entry, LedgerError, LedgerPolicy, ManualClock, MemoryStore, SchemeLedger,
    TransactionCoordinator, WELCOME_BALANCE,
};
use proptest::prelude::*;

const T0: i64 = 1_760_000_000_000;

#[derive(Debug, Clone)]
enum Op {
    Apply(u8),
    Redeem(u64),
    Reward(u64),
    Tick(i64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..12).prop_map(Op::Apply),
        (0u64..120).prop_map(Op::Redeem),
        (1u64..40).prop_map(Op::Reward),
        (-5_000i64..5_000).prop_map(Op::Tick),
    ]
}

fn coordinator() -> (TransactionCoordinator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_millis(T0));
    let policy = LedgerPolicy {
        retry_backoff: Duration::ZERO,
        ..LedgerPolicy::default()
    };
    let coord = TransactionCoordinator::new(Arc::new(MemoryStore::new()), clock.clone(), policy);
    (coord, clock)
}

fn uid() -> AccountId {
    AccountId::new("prop-user").unwrap()
}

// ─────────────────────────────────────────────────────────────────
// LEDGER + BALANCE
// ─────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// PROPERTY: the balance always equals welcome + rewards - spends, and
    /// the scheme history always verifies with one entry per distinct scheme
    #[test]
    fn prop_operations_preserve_invariants(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let (coord, clock) = coordinator();
        let id = uid();
        let mut model = WELCOME_BALANCE;
        let mut seen = HashSet::new();

        for op in ops {
            match op {
                Op::Apply(n) => {
                    let scheme = format!("SCH-{}", n);
                    let r = coord.apply_scheme(&id, &scheme, "Scheme").unwrap();
                    if seen.insert(scheme) {
                        prop_assert!(r.outcome.is_new());
                        model += 5;
                    } else {
                        prop_assert!(!r.outcome.is_new());
                    }
                }
                Op::Redeem(price) => match coord.redeem_perk(&id, "perk", price) {
                    Ok(r) => {
                        model -= price;
                        prop_assert_eq!(r.outcome.balance_after, model);
                    }
                    Err(LedgerError::InsufficientFunds { balance, requested }) => {
                        prop_assert_eq!(balance, model);
                        prop_assert!(requested > model);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {}", e),
                },
                Op::Reward(amount) => {
                    coord.reward_tokens(&id, amount, "bonus").unwrap();
                    model += amount;
                }
                Op::Tick(delta) => clock.advance_millis(delta),
            }
        }

        let account = coord.account(&id).unwrap().account;
        prop_assert_eq!(account.balance(), model);
        prop_assert_eq!(account.ledger().len(), seen.len());
        prop_assert!(account.ledger().verify().is_ok());
    }

    /// PROPERTY: changing any hashed field of any stored entry breaks verification
    #[test]
    fn prop_tampering_is_detected(
        count in 1usize..8,
        victim in any::<prop::sample::Index>(),
        field in 0usize..4,
    ) {
        let (coord, clock) = coordinator();
        let id = uid();
        for i in 0..count {
            clock.advance_millis(1_000);
            coord.apply_scheme(&id, &format!("SCH-{}", i), &format!("Scheme {}", i)).unwrap();
        }
        let ledger = coord.account(&id).unwrap().account.ledger().clone();
        let mut json = serde_json::to_value(&ledger).unwrap();
        let idx = victim.index(count);
        let entry = &mut json[idx];
        match field {
            0 => entry["scheme_id"] = "SCH-forged".into(),
            1 => entry["scheme_name"] = "Forged".into(),
            2 => entry["applied_on"] = "2030-01-01T00:00:00Z".into(),
            _ => entry["prior_hash"] = "f".repeat(64).into(),
        }
        let tampered: SchemeLedger = serde_json::from_value(json).unwrap();
        let err = tampered.verify().unwrap_err();
        prop_assert_eq!(err.index(), idx);
    }

    /// PROPERTY: entries never carry a timestamp earlier than their predecessor,
    /// whatever the clock does
    #[test]
    fn prop_applied_at_is_monotonic(ticks in proptest::collection::vec(-10_000i64..10_000, 1..16)) {
        let (coord, clock) = coordinator();
        let id = uid();
        for (i, t) in ticks.iter().enumerate() {
            clock.advance_millis(*t);
            coord.apply_scheme(&id, &format!("S{}", i), "Scheme").unwrap();
        }
        let account = coord.account(&id).unwrap().account;
        let entries: &[Entry] = account.ledger().entries();
        for pair in entries.windows(2) {
            prop_assert!(pair[0].applied_at() <= pair[1].applied_at());
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// CONCURRENCY
// ─────────────────────────────────────────────────────────────────

#[test]
fn concurrent_rewards_are_never_lost() {
    let (coord, _) = coordinator();
    let coord = TransactionCoordinator::new(
        coord.store().clone(),
        Arc::new(ManualClock::at_millis(T0)),
        LedgerPolicy {
            max_commit_attempts: 1_000,
            retry_backoff: Duration::ZERO,
            ..LedgerPolicy::default()
        },
    );
    let id = uid();
    coord.account(&id).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coord = coord.clone();
            let id = id.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    coord.reward_tokens(&id, 1, "tap").unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let account = coord.account(&id).unwrap().account;
    assert_eq!(account.balance(), WELCOME_BALANCE + 200);
    assert_eq!(account.revision(), 201);
}

#[test]
fn concurrent_distinct_schemes_all_land() {
    let (coord, _) = coordinator();
    let coord = TransactionCoordinator::new(
        coord.store().clone(),
        Arc::new(ManualClock::at_millis(T0)),
        LedgerPolicy {
            max_commit_attempts: 1_000,
            retry_backoff: Duration::ZERO,
            ..LedgerPolicy::default()
        },
    );
    let id = uid();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let coord = coord.clone();
            let id = id.clone();
            std::thread::spawn(move || {
                coord
                    .apply_scheme(&id, &format!("SCH-{}", i), "Parallel")
                    .unwrap()
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap().outcome.is_new());
    }

    let account = coord.account(&id).unwrap().account;
    assert_eq!(account.ledger().len(), 6);
    assert_eq!(account.balance(), WELCOME_BALANCE + 30);
    assert!(account.ledger().verify().is_ok());
}
