// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - CORE MODULE
//
// Per-account scheme history (hash-chained, append-only) and token balance,
// kept in one document and changed only through the TransactionCoordinator.
// All token arithmetic is unsigned integer; balances never go negative.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod account;
pub mod balance;
pub mod chain;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod input;
pub mod ledger;
pub mod profile;
pub mod rewards;
pub mod store;

pub use account::{Account, AccountId, AccountView};
pub use balance::TokenBalance;
pub use chain::{next_hash, verify_chain, GENESIS_HASH};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{
    ApplyOutcome, ChainReport, LedgerPolicy, Receipt, Redemption, Reward, Subject,
    TransactionCoordinator,
};
pub use error::{ChainError, LedgerError};
pub use ledger::{Entry, EntryStatus, SchemeLedger};
pub use profile::{Profile, ProfileUpdate};
pub use rewards::RewardAction;
pub use store::{AccountStore, CommitOutcome, MemoryStore};

/// Tokens granted when an account is first seen.
pub const WELCOME_BALANCE: u64 = 50;
/// Tokens credited for each newly recorded scheme application.
pub const SCHEME_REWARD: u64 = 5;
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;
/// Upper bound for a single `reward_tokens` call.
pub const MAX_REWARD_PER_CALL: u64 = 10_000;
