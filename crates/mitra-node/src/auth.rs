//! Identity resolution in front of every `/api` route.
//!
//! The gate turns a bearer credential into an [`AccountId`]; nothing past
//! this point ever sees the raw token.

use std::sync::Arc;

use mitra_core::{AccountId, LedgerError, Subject};
use mitra_crypto::{CryptoError, IdentityVerifier};
use tracing::debug;

/// Who a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account: AccountId,
    /// Email asserted by the issuer, used to seed new profiles.
    pub email: Option<String>,
}

impl Identity {
    /// What the coordinator needs to act for this caller.
    pub fn subject(&self) -> Subject<'_> {
        Subject::new(&self.account, self.email.as_deref())
    }
}

pub trait AuthGate: Send + Sync {
    fn resolve_identity(&self, credential: &str) -> Result<Identity, LedgerError>;
}

/// HS256 identity tokens signed with the node's shared secret.
pub struct JwtGate {
    verifier: IdentityVerifier,
}

impl JwtGate {
    pub fn new(verifier: IdentityVerifier) -> Self {
        Self { verifier }
    }
}

impl AuthGate for JwtGate {
    fn resolve_identity(&self, credential: &str) -> Result<Identity, LedgerError> {
        let claims = self.verifier.verify(credential).map_err(|e| {
            debug!(error = %e, "identity token rejected");
            match e {
                CryptoError::TokenExpired => LedgerError::Unauthorized("token expired".into()),
                _ => LedgerError::Unauthorized("invalid identity token".into()),
            }
        })?;
        let account = AccountId::new(claims.sub)
            .map_err(|_| LedgerError::Unauthorized("token subject is not a valid account id".into()))?;
        Ok(Identity {
            account,
            email: claims.email,
        })
    }
}

/// Pull the credential out of an `Authorization: Bearer <token>` header.
pub fn bearer_credential(header: Option<&str>) -> Result<&str, LedgerError> {
    let header = header.ok_or_else(|| LedgerError::Unauthorized("missing Authorization header".into()))?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| LedgerError::Unauthorized("malformed Authorization header".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(LedgerError::Unauthorized(
            "expected a Bearer credential".into(),
        ));
    }
    Ok(token.trim())
}

pub mod filters {
    use super::{bearer_credential, AuthGate, Identity};
    use crate::api::ApiRejection;
    use std::sync::Arc;
    use warp::Filter;

    /// Resolves the caller or rejects with `Unauthorized`.
    pub fn authenticated(
        gate: Arc<dyn AuthGate>,
    ) -> impl Filter<Extract = (Identity,), Error = warp::Rejection> + Clone {
        warp::header::optional::<String>("authorization")
            .and(warp::any().map(move || gate.clone()))
            .and_then(|header: Option<String>, gate: Arc<dyn AuthGate>| async move {
                bearer_credential(header.as_deref())
                    .and_then(|token| gate.resolve_identity(token))
                    .map_err(|e| warp::reject::custom(ApiRejection(e)))
            })
    }
}

/// Convenience for wiring a [`JwtGate`] behind the trait object the routes use.
pub fn jwt_gate(verifier: IdentityVerifier) -> Arc<dyn AuthGate> {
    Arc::new(JwtGate::new(verifier))
}
