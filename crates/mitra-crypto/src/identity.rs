//! Identity tokens for the auth gate.
//!
//! A token is an HS256 JWT whose `sub` claim is the account id. The node
//! only trusts the `sub` of a token that verifies against its configured
//! secret and issuer; nothing else in the token is used for authorization.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

use crate::CryptoError;

/// HS256 keys shorter than this are rejected.
pub const MIN_SECRET_LEN: usize = 32;

/// Clock skew tolerated when checking `exp`.
pub const LEEWAY_SECS: u64 = 30;

/// Default issuer used by the node and the CLI.
pub const DEFAULT_ISSUER: &str = "mitra";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Account id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

/// Shared HMAC secret. Wiped from memory on drop.
#[derive(Clone)]
pub struct IdentitySecret {
    bytes: Vec<u8>,
}

impl IdentitySecret {
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::WeakSecret(secret.len()));
        }
        Ok(Self {
            bytes: secret.as_bytes().to_vec(),
        })
    }

    /// Fresh random secret, hex-encoded (64 chars).
    pub fn generate() -> String {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let encoded = hex::encode(raw);
        raw.zeroize();
        encoded
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for IdentitySecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for IdentitySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "IdentitySecret(<{} bytes>)", self.bytes.len())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Issues and verifies identity tokens for one issuer.
#[derive(Clone, Debug)]
pub struct IdentityVerifier {
    secret: IdentitySecret,
    issuer: String,
}

impl IdentityVerifier {
    pub fn new(secret: IdentitySecret, issuer: impl Into<String>) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn issue(
        &self,
        subject: &str,
        email: Option<&str>,
        ttl_secs: u64,
    ) -> Result<String, CryptoError> {
        self.issue_at(subject, email, unix_now(), ttl_secs)
    }

    /// Same as [`issue`](Self::issue) with an explicit issue time.
    pub fn issue_at(
        &self,
        subject: &str,
        email: Option<&str>,
        issued_at: u64,
        ttl_secs: u64,
    ) -> Result<String, CryptoError> {
        let claims = IdentityClaims {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            iss: self.issuer.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CryptoError::EncodingFailed(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, CryptoError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = LEEWAY_SECS;

        decode::<IdentityClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => CryptoError::TokenExpired,
            ErrorKind::InvalidSignature => CryptoError::InvalidSignature,
            ErrorKind::InvalidIssuer => CryptoError::InvalidIssuer,
            other => CryptoError::MalformedToken(format!("{:?}", other)),
        })
    }
}
