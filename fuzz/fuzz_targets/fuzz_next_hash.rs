//! Fuzz target: chain hash computation
//!
//! Verifies:
//! 1. next_hash() never panics
//! 2. Accepted inputs hash deterministically to a 64-char lowercase digest
//! 3. Rejected inputs are exactly the malformed prior hashes and pre-epoch times
//!
//! Run: cargo +nightly fuzz run fuzz_next_hash

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mitra_core::next_hash;
use mitra_crypto::is_digest_hex;

#[derive(Arbitrary, Debug)]
struct FuzzHashInput {
    prior_hash: String,
    scheme_id: String,
    label: String,
    applied_at_millis: i64,
}

fuzz_target!(|input: FuzzHashInput| {
    let first = next_hash(
        &input.prior_hash,
        &input.scheme_id,
        &input.label,
        input.applied_at_millis,
    );
    let well_formed = is_digest_hex(&input.prior_hash) && input.applied_at_millis >= 0;
    assert_eq!(first.is_ok(), well_formed);

    if let Ok(hash) = first {
        assert!(is_digest_hex(&hash));
        let second = next_hash(
            &input.prior_hash,
            &input.scheme_id,
            &input.label,
            input.applied_at_millis,
        )
        .expect("same input accepted twice");
        assert_eq!(hash, second, "next_hash must be deterministic");
    }
});
