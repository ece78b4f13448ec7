// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - DATABASE MODULE
//
// sled-backed AccountStore. Each account is one JSON document in the
// `accounts` tree; its revision lives in the `revisions` tree. A commit is a
// cross-tree transaction that only writes if the stored revision still
// matches the one the caller read.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use mitra_core::{Account, AccountId, AccountStore, CommitOutcome, LedgerError};
use sled::transaction::{abort, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

const TREE_ACCOUNTS: &str = "accounts";
const TREE_REVISIONS: &str = "revisions";

/// Delays between attempts to open a locked database.
const OPEN_RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Transaction abort reason: another writer committed first.
#[derive(Debug)]
struct RevisionMismatch;

pub struct SledStore {
    db: Db,
    accounts: Tree,
    revisions: Tree,
    flush_every_commit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub accounts_count: usize,
    pub size_on_disk: u64,
}

impl SledStore {
    /// Probe sled's flock without blocking so a second node on the same
    /// directory fails fast instead of hanging in `sled::open`.
    #[cfg(unix)]
    fn is_db_lock_available(path: &Path) -> Result<bool, String> {
        let db_file = path.join("db");
        if !db_file.exists() {
            return Ok(true);
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(&db_file)
            .map_err(|e| format!("cannot open db file for lock check: {}", e))?;

        let fd = file.as_raw_fd();
        // SAFETY: fd is owned by `file`, which outlives both calls.
        let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if ret == 0 {
            unsafe { libc::flock(fd, libc::LOCK_UN) };
            Ok(true)
        } else {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                Ok(false)
            } else {
                Err(format!("flock probe failed: {}", err))
            }
        }
    }

    #[cfg(not(unix))]
    fn is_db_lock_available(_path: &Path) -> Result<bool, String> {
        Ok(true)
    }

    /// Open or create the database, retrying with backoff while another
    /// process holds the lock.
    pub fn open<P: AsRef<Path>>(path: P, flush_every_commit: bool) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let mut last_error = String::new();

        for attempt in 0..=OPEN_RETRY_DELAYS_MS.len() {
            if attempt > 0 {
                let delay = OPEN_RETRY_DELAYS_MS[attempt - 1];
                warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay,
                    "database locked, retrying"
                );
                std::thread::sleep(Duration::from_millis(delay));
            }

            match Self::is_db_lock_available(path) {
                Ok(true) => {}
                Ok(false) => {
                    last_error = "lock held by another process".to_string();
                    continue;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "lock probe failed"),
            }

            match sled::open(path) {
                Ok(db) => {
                    let store = Self::from_db(db, flush_every_commit)?;
                    info!(
                        path = %path.display(),
                        accounts = store.accounts.len(),
                        "database opened"
                    );
                    return Ok(store);
                }
                Err(e) if Self::is_lock_error(&e) => last_error = e.to_string(),
                Err(e) => return Err(LedgerError::store(format!("failed to open database: {}", e))),
            }
        }

        Err(LedgerError::store(format!(
            "database at {} still locked after {} retries: {} (is another mitra-node running?)",
            path.display(),
            OPEN_RETRY_DELAYS_MS.len(),
            last_error
        )))
    }

    /// Throwaway database, removed when dropped.
    pub fn temporary() -> Result<Self, LedgerError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(LedgerError::store)?;
        Self::from_db(db, false)
    }

    fn from_db(db: Db, flush_every_commit: bool) -> Result<Self, LedgerError> {
        let accounts = db.open_tree(TREE_ACCOUNTS).map_err(LedgerError::store)?;
        let revisions = db.open_tree(TREE_REVISIONS).map_err(LedgerError::store)?;
        Ok(Self {
            db,
            accounts,
            revisions,
            flush_every_commit,
        })
    }

    fn is_lock_error(e: &sled::Error) -> bool {
        let msg = e.to_string();
        msg.contains("Resource temporarily unavailable")
            || msg.contains("WouldBlock")
            || msg.contains("Would block")
            || msg.contains("lock")
            || msg.contains("EAGAIN")
    }

    /// Flush pending writes. Called on graceful shutdown.
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush().map(|_| ()).map_err(LedgerError::store)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            accounts_count: self.accounts.len(),
            size_on_disk: self.db.size_on_disk().unwrap_or(0),
        }
    }

    /// Stored revision for `id`, independent of the document.
    pub fn revision(&self, id: &AccountId) -> Result<Option<u64>, LedgerError> {
        let raw = self
            .revisions
            .get(id.as_str().as_bytes())
            .map_err(LedgerError::store)?;
        raw.map(|v| decode_revision(&v)).transpose()
    }
}

fn encode_revision(revision: u64) -> [u8; 8] {
    revision.to_le_bytes()
}

fn decode_revision(raw: &[u8]) -> Result<u64, LedgerError> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| LedgerError::store(format!("corrupt revision record ({} bytes)", raw.len())))?;
    Ok(u64::from_le_bytes(bytes))
}

impl AccountStore for SledStore {
    fn fetch(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        let raw = self
            .accounts
            .get(id.as_str().as_bytes())
            .map_err(LedgerError::store)?;
        match raw {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LedgerError::store(format!("corrupt account {}: {}", id, e))),
            None => Ok(None),
        }
    }

    fn commit(
        &self,
        expected: Option<u64>,
        account: &Account,
    ) -> Result<CommitOutcome, LedgerError> {
        // Serialize outside the transaction; the closure may run more than once.
        let key = account.id().as_str().as_bytes().to_vec();
        let document = serde_json::to_vec(account)
            .map_err(|e| LedgerError::store(format!("cannot encode account: {}", e)))?;
        let revision = encode_revision(account.revision());
        let expected_raw = expected.map(encode_revision);

        let result = (&self.accounts, &self.revisions).transaction(|(tx_accounts, tx_revisions)| {
            let current = tx_revisions.get(key.as_slice())?;
            if current.as_deref() != expected_raw.as_ref().map(|r| r.as_slice()) {
                return abort(RevisionMismatch);
            }
            tx_accounts.insert(key.as_slice(), document.as_slice())?;
            tx_revisions.insert(key.as_slice(), &revision[..])?;
            Ok(())
        });

        match result {
            Ok(()) => {
                if self.flush_every_commit {
                    self.flush()?;
                }
                Ok(CommitOutcome::Committed)
            }
            Err(TransactionError::Abort(RevisionMismatch)) => Ok(CommitOutcome::Conflict),
            Err(TransactionError::Storage(e)) => Err(LedgerError::store(e)),
        }
    }

    fn account_count(&self) -> Result<usize, LedgerError> {
        Ok(self.accounts.len())
    }
}
