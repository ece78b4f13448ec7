use thiserror::Error;

/// Every failure a core operation can surface to its caller.
///
/// `InsufficientFunds` and `Contention` are the domain outcomes; the rest
/// are request-shape or infrastructure failures passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("contention: gave up after {attempts} conflicting commit attempts")]
    Contention { attempts: u32 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl LedgerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        LedgerError::InvalidArgument(msg.into())
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        LedgerError::StoreUnavailable(err.to_string())
    }

    /// Stable snake_case code used in wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::InvalidArgument(_) => "invalid_argument",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::Contention { .. } => "contention",
            LedgerError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Whether repeating the whole request can succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Contention { .. })
    }
}

/// Why a stored scheme history failed verification. `index` is the
/// position of the first offending entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("entry {index}: prior_hash does not match the preceding entry")]
    BrokenLink { index: usize },

    #[error("entry {index}: stored hash does not match recomputed hash")]
    HashMismatch { index: usize },

    #[error("entry {index}: applied_on earlier than the preceding entry")]
    TimestampRegression { index: usize },

    #[error("entry {index}: scheme {scheme_id} already recorded earlier")]
    DuplicateScheme { index: usize, scheme_id: String },

    #[error("entry {index}: {reason}")]
    Malformed { index: usize, reason: String },
}

impl ChainError {
    pub fn index(&self) -> usize {
        match self {
            ChainError::BrokenLink { index }
            | ChainError::HashMismatch { index }
            | ChainError::TimestampRegression { index }
            | ChainError::DuplicateScheme { index, .. }
            | ChainError::Malformed { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(LedgerError::invalid("x").kind(), "invalid_argument");
        assert_eq!(
            LedgerError::InsufficientFunds {
                balance: 1,
                requested: 2
            }
            .kind(),
            "insufficient_funds"
        );
        assert_eq!(LedgerError::Contention { attempts: 5 }.kind(), "contention");
        assert_eq!(LedgerError::store("disk").kind(), "store_unavailable");
        assert_eq!(LedgerError::Unauthorized("no".into()).kind(), "unauthorized");
    }

    #[test]
    fn test_only_contention_is_retryable() {
        assert!(LedgerError::Contention { attempts: 5 }.is_retryable());
        assert!(!LedgerError::store("down").is_retryable());
        assert!(!LedgerError::InsufficientFunds {
            balance: 0,
            requested: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_chain_error_index() {
        assert_eq!(ChainError::HashMismatch { index: 3 }.index(), 3);
        assert_eq!(
            ChainError::DuplicateScheme {
                index: 7,
                scheme_id: "S".into()
            }
            .index(),
            7
        );
    }
}
