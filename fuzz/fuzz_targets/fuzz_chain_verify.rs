//! Fuzz target: chain verification after arbitrary tampering
//!
//! Builds a valid chain from fuzzer-chosen schemes, flips one field of one
//! entry through its JSON form, and checks the verifier either still accepts
//! (the edit was a no-op) or reports an index at or before the edit.
//!
//! Run: cargo +nightly fuzz run fuzz_chain_verify

#![no_main]
use arbitrary::Arbitrary;
use chrono::DateTime;
use libfuzzer_sys::fuzz_target;
use mitra_core::{verify_chain, Entry, GENESIS_HASH};

#[derive(Arbitrary, Debug)]
struct FuzzChainInput {
    labels: Vec<String>,
    start_millis: u32,
    steps: Vec<u16>,
    target: usize,
    field: u8,
    replacement: String,
}

fuzz_target!(|input: FuzzChainInput| {
    let mut entries: Vec<Entry> = Vec::new();
    let mut millis = i64::from(input.start_millis);
    for (i, label) in input.labels.iter().take(32).enumerate() {
        millis += i64::from(input.steps.get(i).copied().unwrap_or(1));
        let Some(at) = DateTime::from_timestamp_millis(millis) else {
            return;
        };
        let prior = entries.last().map(Entry::hash).unwrap_or(GENESIS_HASH).to_string();
        let entry = Entry::seal(&prior, &format!("S{}", i), label, at).expect("valid seal");
        entries.push(entry);
    }
    assert!(verify_chain(&entries).is_ok());
    if entries.is_empty() {
        return;
    }

    let idx = input.target % entries.len();
    let mut doc = serde_json::to_value(&entries[idx]).expect("entry encodes");
    let key = match input.field % 4 {
        0 => "scheme_id",
        1 => "scheme_name",
        2 => "prior_hash",
        _ => "hash",
    };
    doc[key] = serde_json::Value::String(input.replacement.clone());
    let Ok(tampered) = serde_json::from_value::<Entry>(doc) else {
        return;
    };
    let unchanged = tampered == entries[idx];
    entries[idx] = tampered;

    match verify_chain(&entries) {
        Ok(()) => assert!(unchanged, "edit at {} went undetected", idx),
        Err(e) => assert!(e.index() <= idx),
    }
});
