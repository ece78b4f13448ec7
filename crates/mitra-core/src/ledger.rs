use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{self, GENESIS_HASH};
use crate::error::{ChainError, LedgerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Applied,
}

/// One scheme application. Sealed once at commit time and never changed.
///
/// Serialized in the persisted/wire shape: `scheme_id`, `scheme_name`,
/// `applied_on` (ISO-8601), `status`, `prior_hash`, `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub(crate) scheme_id: String,
    #[serde(rename = "scheme_name")]
    pub(crate) label: String,
    #[serde(rename = "applied_on")]
    pub(crate) applied_at: DateTime<Utc>,
    pub(crate) status: EntryStatus,
    pub(crate) prior_hash: String,
    pub(crate) hash: String,
}

impl Entry {
    /// Build an entry and compute its hash from `prior_hash`.
    pub fn seal(
        prior_hash: &str,
        scheme_id: &str,
        label: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let hash = chain::next_hash(prior_hash, scheme_id, label, applied_at.timestamp_millis())?;
        Ok(Self {
            scheme_id: scheme_id.to_string(),
            label: label.to_string(),
            applied_at,
            status: EntryStatus::Applied,
            prior_hash: prior_hash.to_string(),
            hash,
        })
    }

    pub fn scheme_id(&self) -> &str {
        &self.scheme_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }

    pub fn applied_at_millis(&self) -> i64 {
        self.applied_at.timestamp_millis()
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn prior_hash(&self) -> &str {
        &self.prior_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Per-account append-only scheme history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemeLedger {
    entries: Vec<Entry>,
}

impl SchemeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently appended entry.
    pub fn tail(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Hash the next entry must link to.
    pub fn tail_hash(&self) -> &str {
        self.tail().map(Entry::hash).unwrap_or(GENESIS_HASH)
    }

    pub fn contains(&self, scheme_id: &str) -> bool {
        self.entries.iter().any(|e| e.scheme_id == scheme_id)
    }

    /// Only the coordinator appends, inside a unit of work that also moves
    /// the balance.
    pub(crate) fn append(&mut self, entry: Entry) -> Result<(), LedgerError> {
        if entry.prior_hash != self.tail_hash() {
            return Err(LedgerError::invalid(format!(
                "entry for {} does not link to the current tail",
                entry.scheme_id
            )));
        }
        if self.contains(&entry.scheme_id) {
            return Err(LedgerError::invalid(format!(
                "scheme {} already recorded",
                entry.scheme_id
            )));
        }
        if let Some(tail) = self.tail() {
            if entry.applied_at < tail.applied_at {
                return Err(LedgerError::invalid("applied_at earlier than ledger tail"));
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verify(&self) -> Result<(), ChainError> {
        chain::verify_chain(&self.entries)
    }
}

impl<'a> IntoIterator for &'a SchemeLedger {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
