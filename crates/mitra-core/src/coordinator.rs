//! Atomic business operations over an [`AccountStore`].
//!
//! Every operation is one read-modify-write unit:
//!
//! ```text
//! Started ─ fetch snapshot ─ Validated ─ commit ─┬─ Committed
//!                │                               └─ Conflict ─ backoff ─ Started
//!                └─ rule violated ─ Aborted (nothing written)
//! ```
//!
//! Conflicts are retried up to `max_commit_attempts` times and then surface
//! as `Contention`. Nothing is locked in-process, so different accounts
//! never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::account::{Account, AccountId};
use crate::clock::{truncate_to_millis, Clock};
use crate::error::{ChainError, LedgerError};
use crate::input;
use crate::ledger::Entry;
use crate::profile::ProfileUpdate;
use crate::rewards::RewardAction;
use crate::store::{AccountStore, CommitOutcome};
use crate::{DEFAULT_MAX_COMMIT_ATTEMPTS, MAX_REWARD_PER_CALL, SCHEME_REWARD, WELCOME_BALANCE};

/// Tunables for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPolicy {
    pub welcome_balance: u64,
    pub scheme_reward: u64,
    pub max_commit_attempts: u32,
    /// Base delay between conflicting attempts; grows linearly with jitter.
    pub retry_backoff: Duration,
    pub max_reward_per_call: u64,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            welcome_balance: WELCOME_BALANCE,
            scheme_reward: SCHEME_REWARD,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            retry_backoff: Duration::from_millis(5),
            max_reward_per_call: MAX_REWARD_PER_CALL,
        }
    }
}

/// Result of a finished unit of work: the account as committed (or as read,
/// for no-ops), the operation-specific outcome, and how many attempts it took.
#[derive(Debug, Clone)]
pub struct Receipt<T> {
    pub account: Account,
    pub outcome: T,
    pub attempts: u32,
}

impl<T> Receipt<T> {
    /// Commit attempts that lost a race before this one went through.
    pub fn conflicts(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied { entry: Entry, reward: u64 },
    AlreadyApplied,
}

impl ApplyOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub perk_id: String,
    pub price: u64,
    pub balance_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reward {
    pub amount: u64,
    pub reason: String,
    pub balance_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub entries: usize,
    pub tail_hash: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<usize>,
}

impl ChainReport {
    fn from_result(account: &Account, result: Result<(), ChainError>) -> Self {
        let ledger = account.ledger();
        Self {
            entries: ledger.len(),
            tail_hash: ledger.tail_hash().to_string(),
            valid: result.is_ok(),
            failed_index: result.as_ref().err().map(ChainError::index),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

/// The account an operation acts for. `email` comes from the identity
/// provider and is only used to seed the profile of an account that does
/// not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject<'a> {
    pub id: &'a AccountId,
    pub email: Option<&'a str>,
}

impl<'a> Subject<'a> {
    pub fn new(id: &'a AccountId, email: Option<&'a str>) -> Self {
        Self { id, email }
    }

    fn seed_email(&self) -> Option<&'a str> {
        self.email
            .map(str::trim)
            .filter(|e| !e.is_empty() && input::optional_text("email", e).is_ok())
    }
}

impl<'a> From<&'a AccountId> for Subject<'a> {
    fn from(id: &'a AccountId) -> Self {
        Self { id, email: None }
    }
}

enum Step<T> {
    Write(T),
    Unchanged(T),
}

#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    policy: LedgerPolicy,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn AccountStore>, clock: Arc<dyn Clock>, policy: LedgerPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Current account, created with the welcome balance on first sight.
    /// A new account takes its email from the subject.
    pub fn account<'a>(&self, subject: impl Into<Subject<'a>>) -> Result<Receipt<()>, LedgerError> {
        self.run_transaction(subject.into(), "account", |_, _| Ok(Step::Unchanged(())))
    }

    /// Record a scheme application and pay the scheme reward, atomically.
    /// Re-applying an already recorded scheme changes nothing.
    pub fn apply_scheme<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        scheme_id: &str,
        label: &str,
    ) -> Result<Receipt<ApplyOutcome>, LedgerError> {
        let subject = subject.into();
        let id = subject.id;
        input::identifier("scheme_id", scheme_id)?;
        input::text("scheme_name", label)?;
        let reward = self.policy.scheme_reward;

        self.run_transaction(subject, "apply_scheme", |account, now| {
            if account.ledger().contains(scheme_id) {
                debug!(account = %id, scheme_id, "scheme already applied");
                return Ok(Step::Unchanged(ApplyOutcome::AlreadyApplied));
            }

            let applied_at = match account.ledger().tail() {
                Some(tail) if tail.applied_at() > now => tail.applied_at(),
                _ => now,
            };
            let entry = Entry::seal(account.ledger().tail_hash(), scheme_id, label, applied_at)?;
            account.ledger_mut().append(entry.clone())?;
            account.balance_mut().credit(reward)?;
            Ok(Step::Write(ApplyOutcome::Applied { entry, reward }))
        })
    }

    /// Spend tokens on a perk. Not recorded in the scheme history.
    pub fn redeem_perk<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        perk_id: &str,
        price: u64,
    ) -> Result<Receipt<Redemption>, LedgerError> {
        input::identifier("perk_id", perk_id)?;

        self.run_transaction(subject.into(), "redeem_perk", |account, _now| {
            if price == 0 {
                return Ok(Step::Unchanged(Redemption {
                    perk_id: perk_id.to_string(),
                    price,
                    balance_after: account.balance(),
                }));
            }
            let balance_after = account.balance_mut().debit(price)?;
            Ok(Step::Write(Redemption {
                perk_id: perk_id.to_string(),
                price,
                balance_after,
            }))
        })
    }

    /// Engagement bonus: plain increment, no duplicate check, no history.
    pub fn reward_tokens<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        amount: u64,
        reason: &str,
    ) -> Result<Receipt<Reward>, LedgerError> {
        if amount == 0 || amount > self.policy.max_reward_per_call {
            return Err(LedgerError::invalid(format!(
                "reward amount must be between 1 and {}, got {}",
                self.policy.max_reward_per_call, amount
            )));
        }
        input::text("reason", reason)?;

        self.run_transaction(subject.into(), "reward_tokens", |account, _now| {
            let balance_after = account.balance_mut().credit(amount)?;
            Ok(Step::Write(Reward {
                amount,
                reason: reason.to_string(),
                balance_after,
            }))
        })
    }

    pub fn reward_action<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        action: RewardAction,
    ) -> Result<Receipt<Reward>, LedgerError> {
        self.reward_tokens(subject, action.amount(), action.as_str())
    }

    /// Returns whether any field changed.
    pub fn update_profile<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        update: &ProfileUpdate,
    ) -> Result<Receipt<bool>, LedgerError> {
        update.validate()?;
        self.run_transaction(subject.into(), "update_profile", |account, _now| {
            if update.apply(account.profile_mut()) {
                Ok(Step::Write(true))
            } else {
                Ok(Step::Unchanged(false))
            }
        })
    }

    /// Recompute the stored chain from genesis.
    pub fn verify_account<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
    ) -> Result<Receipt<ChainReport>, LedgerError> {
        let subject = subject.into();
        let id = subject.id;
        let receipt = self.account(subject)?;
        let result = receipt.account.ledger().verify();
        if let Err(e) = &result {
            warn!(account = %id, error = %e, "scheme history failed verification");
        }
        let report = ChainReport::from_result(&receipt.account, result);
        Ok(Receipt {
            account: receipt.account,
            outcome: report,
            attempts: receipt.attempts,
        })
    }

    fn run_transaction<T, F>(
        &self,
        subject: Subject<'_>,
        op: &'static str,
        mut work: F,
    ) -> Result<Receipt<T>, LedgerError>
    where
        F: FnMut(&mut Account, DateTime<Utc>) -> Result<Step<T>, LedgerError>,
    {
        let id = subject.id;
        let max_attempts = self.policy.max_commit_attempts.max(1);

        for attempt in 1..=max_attempts {
            let snapshot = self.store.fetch(id)?;
            let expected = snapshot.as_ref().map(Account::revision);
            let now = truncate_to_millis(self.clock.now());
            let mut account = match snapshot {
                Some(account) => account,
                None => {
                    let mut fresh = Account::open(id.clone(), self.policy.welcome_balance, now);
                    if let Some(email) = subject.seed_email() {
                        fresh.profile_mut().email = email.to_string();
                    }
                    fresh
                }
            };

            let (outcome, must_write) = match work(&mut account, now)? {
                Step::Write(outcome) => (outcome, true),
                // A brand-new account is written even by read-only operations.
                Step::Unchanged(outcome) => (outcome, expected.is_none()),
            };

            if !must_write {
                return Ok(Receipt {
                    account,
                    outcome,
                    attempts: attempt,
                });
            }

            account.set_revision(expected.map_or(1, |r| r + 1));
            match self.store.commit(expected, &account)? {
                CommitOutcome::Committed => {
                    info!(
                        account = %id,
                        op,
                        attempt,
                        revision = account.revision(),
                        balance = account.balance(),
                        "committed"
                    );
                    return Ok(Receipt {
                        account,
                        outcome,
                        attempts: attempt,
                    });
                }
                CommitOutcome::Conflict => {
                    debug!(account = %id, op, attempt, "write conflict, retrying");
                    if attempt < max_attempts {
                        self.backoff(attempt);
                    }
                }
            }
        }

        warn!(account = %id, op, attempts = max_attempts, "giving up after repeated conflicts");
        Err(LedgerError::Contention {
            attempts: max_attempts,
        })
    }

    fn backoff(&self, attempt: u32) {
        let base = self.policy.retry_backoff;
        if base.is_zero() {
            return;
        }
        let cap_us = u64::try_from(base.as_micros()).unwrap_or(u64::MAX);
        let jitter_us = rand::thread_rng().gen_range(0..=cap_us);
        std::thread::sleep(base.saturating_mul(attempt) + Duration::from_micros(jitter_us));
    }
}
