//! Fuzz target: request bodies and identifier checks
//!
//! Profile updates arrive as untrusted JSON. Parsing, validation and apply
//! must never panic, and validated updates must keep every field in bounds.
//!
//! Run: cargo +nightly fuzz run fuzz_request_input -- -max_len=2048

#![no_main]
use libfuzzer_sys::fuzz_target;
use mitra_core::input::{identifier, MAX_ID_LEN};
use mitra_core::{AccountId, Profile, ProfileUpdate, RewardAction};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if identifier("id", s).is_ok() {
            assert!(!s.is_empty() && s.len() <= MAX_ID_LEN);
        }
        let _ = AccountId::new(s);
        let _ = s.parse::<RewardAction>();
    }

    if let Ok(update) = serde_json::from_slice::<ProfileUpdate>(data) {
        if update.validate().is_ok() {
            let mut profile = Profile::default();
            let changed = update.apply(&mut profile);
            assert!(!changed || !update.is_empty());
        }
    }
});
