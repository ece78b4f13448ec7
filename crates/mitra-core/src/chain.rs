//! Scheme-history hash chain.
//!
//! `hash[i] = SHA-256(prior_hash ‖ scheme_id ‖ label ‖ applied_at_millis)`
//! where the three string fields are length-prefixed and the timestamp is
//! 8 bytes little-endian. `prior_hash` of the first entry is [`GENESIS_HASH`].

use std::collections::HashSet;

use mitra_crypto::{is_digest_hex, FieldHasher};

use crate::error::{ChainError, LedgerError};
use crate::ledger::Entry;

/// `prior_hash` of the first entry of every account.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Digest binding an entry to its predecessor.
///
/// Fails with `InvalidArgument` when `prior_hash` is not a 64-char lowercase
/// hex digest or the timestamp is before the Unix epoch.
pub fn next_hash(
    prior_hash: &str,
    scheme_id: &str,
    label: &str,
    applied_at_millis: i64,
) -> Result<String, LedgerError> {
    if !is_digest_hex(prior_hash) {
        return Err(LedgerError::invalid(format!(
            "prior hash must be 64 lowercase hex chars, got {:?}",
            prior_hash
        )));
    }
    if applied_at_millis < 0 {
        return Err(LedgerError::invalid(format!(
            "applied_at must not precede the epoch, got {}",
            applied_at_millis
        )));
    }

    Ok(FieldHasher::new()
        .str_field(prior_hash)
        .str_field(scheme_id)
        .str_field(label)
        .i64_field(applied_at_millis)
        .finalize_hex())
}

/// Recompute the chain from genesis and compare every stored link and hash.
pub fn verify_chain(entries: &[Entry]) -> Result<(), ChainError> {
    let mut expected_prior = GENESIS_HASH;
    let mut last_millis = i64::MIN;
    let mut seen: HashSet<&str> = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        if entry.prior_hash() != expected_prior {
            return Err(ChainError::BrokenLink { index });
        }

        let millis = entry.applied_at_millis();
        if millis < last_millis {
            return Err(ChainError::TimestampRegression { index });
        }

        if !seen.insert(entry.scheme_id()) {
            return Err(ChainError::DuplicateScheme {
                index,
                scheme_id: entry.scheme_id().to_string(),
            });
        }

        let recomputed = next_hash(entry.prior_hash(), entry.scheme_id(), entry.label(), millis)
            .map_err(|e| ChainError::Malformed {
                index,
                reason: e.to_string(),
            })?;
        if recomputed != entry.hash() {
            return Err(ChainError::HashMismatch { index });
        }

        expected_prior = entry.hash();
        last_millis = millis;
    }

    Ok(())
}
