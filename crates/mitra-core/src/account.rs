use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

use crate::balance::TokenBalance;
use crate::error::LedgerError;
use crate::input;
use crate::ledger::{Entry, SchemeLedger};
use crate::profile::Profile;

/// Identity issued by the auth gate. Trusted as-is once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, LedgerError> {
        let id = id.into();
        input::identifier("account id", &id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountId::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl Borrow<str> for AccountId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-account document: balance and scheme history move together.
///
/// `revision` is bumped by exactly one on every committed write and is
/// what stores compare-and-swap on. A revision of 0 means "not yet stored".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    balance: TokenBalance,
    #[serde(rename = "scheme_history")]
    ledger: SchemeLedger,
    #[serde(default)]
    profile: Profile,
    joined_at: DateTime<Utc>,
    revision: u64,
}

impl Account {
    /// Fresh, unstored account holding the welcome balance.
    pub fn open(id: AccountId, welcome_balance: u64, joined_at: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: TokenBalance::new(welcome_balance),
            ledger: SchemeLedger::new(),
            profile: Profile::default(),
            joined_at,
            revision: 0,
        }
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn balance(&self) -> u64 {
        self.balance.get()
    }

    pub fn ledger(&self) -> &SchemeLedger {
        &self.ledger
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_stored(&self) -> bool {
        self.revision > 0
    }

    pub(crate) fn balance_mut(&mut self) -> &mut TokenBalance {
        &mut self.balance
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut SchemeLedger {
        &mut self.ledger
    }

    pub(crate) fn profile_mut(&mut self) -> &mut Profile {
        &mut self.profile
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    pub fn view(&self) -> AccountView {
        AccountView {
            uid: self.id.to_string(),
            tokens: self.balance.get(),
            schemes_used: self.ledger.len(),
            scheme_history: self.ledger.entries().to_vec(),
            profile: self.profile.clone(),
            profile_complete: self.profile.is_complete(),
            joined_at: self.joined_at,
            revision: self.revision,
        }
    }
}

/// What callers see of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub uid: String,
    pub tokens: u64,
    pub schemes_used: usize,
    pub scheme_history: Vec<Entry>,
    #[serde(flatten)]
    pub profile: Profile,
    pub profile_complete: bool,
    pub joined_at: DateTime<Utc>,
    pub revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::GENESIS_HASH;

    fn joined() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_760_000_000_000).unwrap()
    }

    #[test]
    fn test_account_id_validation() {
        assert!(AccountId::new("uid_AbC123").is_ok());
        assert!(AccountId::new("").is_err());
        assert!(AccountId::new("has space").is_err());
        let parsed: Result<AccountId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_open_has_welcome_balance_and_no_history() {
        let acct = Account::open(AccountId::new("u1").unwrap(), 50, joined());
        assert_eq!(acct.balance(), 50);
        assert!(acct.ledger().is_empty());
        assert_eq!(acct.ledger().tail_hash(), GENESIS_HASH);
        assert!(!acct.is_stored());
    }

    #[test]
    fn test_document_round_trip() {
        let mut acct = Account::open(AccountId::new("u1").unwrap(), 50, joined());
        let entry = Entry::seal(GENESIS_HASH, "SCH-1", "One", joined()).unwrap();
        acct.ledger_mut().append(entry).unwrap();
        acct.balance_mut().credit(5).unwrap();
        acct.set_revision(3);

        let bytes = serde_json::to_vec(&acct).unwrap();
        let back: Account = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, acct);
        assert_eq!(back.revision(), 3);
    }

    #[test]
    fn test_view_shape() {
        let mut acct = Account::open(AccountId::new("u1").unwrap(), 50, joined());
        acct.profile_mut().username = "Asha".into();
        let json = serde_json::to_value(acct.view()).unwrap();
        assert_eq!(json["uid"], "u1");
        assert_eq!(json["tokens"], 50);
        assert_eq!(json["schemes_used"], 0);
        assert_eq!(json["username"], "Asha");
        assert_eq!(json["profile_complete"], false);
        assert!(json["scheme_history"].as_array().unwrap().is_empty());
    }
}
