// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - CRYPTOGRAPHY MODULE
//
// - SHA-256 digests encoded as lowercase hex (64 chars)
// - Self-delimiting field hasher used by the scheme-history chain
// - HS256 identity tokens consumed by the node's auth gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use sha2::{Digest, Sha256};

pub mod identity;

pub use identity::{IdentityClaims, IdentitySecret, IdentityVerifier};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum CryptoError {
    /// Secret shorter than the minimum accepted length
    WeakSecret(usize),
    TokenExpired,
    InvalidSignature,
    InvalidIssuer,
    MalformedToken(String),
    EncodingFailed(String),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CryptoError::WeakSecret(len) => {
                write!(
                    f,
                    "Identity secret too short: {} bytes (minimum {})",
                    len,
                    identity::MIN_SECRET_LEN
                )
            }
            CryptoError::TokenExpired => write!(f, "Identity token expired"),
            CryptoError::InvalidSignature => write!(f, "Identity token signature invalid"),
            CryptoError::InvalidIssuer => write!(f, "Identity token issuer not accepted"),
            CryptoError::MalformedToken(msg) => write!(f, "Malformed identity token: {}", msg),
            CryptoError::EncodingFailed(msg) => write!(f, "Token encoding failed: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

/// SHA-256 of `bytes`, lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// True if `s` looks like a digest produced by this crate:
/// exactly 64 lowercase hex characters.
pub fn is_digest_hex(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Incremental SHA-256 over self-delimiting fields.
///
/// Every variable-length field is preceded by its byte length as a u64
/// (little-endian), so `("AB", "C")` and `("A", "BC")` feed different byte
/// streams into the digest. Integers are written fixed-width.
pub struct FieldHasher {
    inner: Sha256,
}

impl Default for FieldHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldHasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    pub fn field(mut self, bytes: &[u8]) -> Self {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    pub fn str_field(self, s: &str) -> Self {
        self.field(s.as_bytes())
    }

    pub fn i64_field(mut self, value: i64) -> Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}
