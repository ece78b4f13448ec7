//! Fuzz target: scheme-history and account document deserialization
//!
//! Persisted account documents come back from disk as JSON. Arbitrary bytes
//! must never panic, and anything that parses must survive re-encoding.
//!
//! Run: cargo +nightly fuzz run fuzz_entry_deserialize -- -max_len=4096

#![no_main]
use libfuzzer_sys::fuzz_target;
use mitra_core::{verify_chain, Account, Entry};

fuzz_target!(|data: &[u8]| {
    if let Ok(entry) = serde_json::from_slice::<Entry>(data) {
        let encoded = serde_json::to_vec(&entry).expect("entry re-encodes");
        let again: Entry = serde_json::from_slice(&encoded).expect("entry re-decodes");
        assert_eq!(entry, again);
    }

    if let Ok(entries) = serde_json::from_slice::<Vec<Entry>>(data) {
        let _ = verify_chain(&entries);
    }

    if let Ok(account) = serde_json::from_slice::<Account>(data) {
        let _ = account.ledger().verify();
        let _ = account.view();
    }
});
