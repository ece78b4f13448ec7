//! Storage seam for account documents.
//!
//! The coordinator never holds a lock across its read-modify-write cycle.
//! Atomicity comes from `commit`, which replaces the whole document only if
//! the stored revision still equals the one that was read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::account::{Account, AccountId};
use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer got there first; the caller should re-read and retry.
    Conflict,
}

pub trait AccountStore: Send + Sync {
    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, LedgerError>;

    /// Store `account` iff the current revision equals `expected`
    /// (`None` = no document yet). Must be all-or-nothing.
    fn commit(&self, expected: Option<u64>, account: &Account)
        -> Result<CommitOutcome, LedgerError>;

    fn account_count(&self) -> Result<usize, LedgerError>;
}

impl<S: AccountStore + ?Sized> AccountStore for Arc<S> {
    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        (**self).fetch(id)
    }

    fn commit(
        &self,
        expected: Option<u64>,
        account: &Account,
    ) -> Result<CommitOutcome, LedgerError> {
        (**self).commit(expected, account)
    }

    fn account_count(&self) -> Result<usize, LedgerError> {
        (**self).account_count()
    }
}

/// Recover from poisoned mutex instead of panicking
pub(crate) fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process store. The mutex is held only for the duration of a single
/// fetch or compare-and-swap, never across a unit of work.
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<AccountId, Account>>,
    unavailable: AtomicBool,
    forced_conflicts: AtomicU32,
    commits: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreUnavailable` until cleared.
    #[cfg(any(test, feature = "test-util"))]
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Report the next `n` commits as conflicts without writing.
    #[cfg(any(test, feature = "test-util"))]
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::store("memory store marked unavailable"));
        }
        Ok(())
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl AccountStore for MemoryStore {
    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        self.check_available()?;
        Ok(safe_lock(&self.accounts).get(id).cloned())
    }

    fn commit(
        &self,
        expected: Option<u64>,
        account: &Account,
    ) -> Result<CommitOutcome, LedgerError> {
        self.check_available()?;
        if self.take_forced_conflict() {
            return Ok(CommitOutcome::Conflict);
        }

        let mut accounts = safe_lock(&self.accounts);
        let current = accounts.get(account.id()).map(Account::revision);
        if current != expected {
            return Ok(CommitOutcome::Conflict);
        }
        accounts.insert(account.id().clone(), account.clone());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitOutcome::Committed)
    }

    fn account_count(&self) -> Result<usize, LedgerError> {
        self.check_available()?;
        Ok(safe_lock(&self.accounts).len())
    }
}
