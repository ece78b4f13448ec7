use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Non-negative token counter. All arithmetic is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenBalance(u64);

impl TokenBalance {
    pub const fn new(tokens: u64) -> Self {
        Self(tokens)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    pub fn credit(&mut self, amount: u64) -> Result<u64, LedgerError> {
        self.0 = self
            .0
            .checked_add(amount)
            .ok_or_else(|| LedgerError::invalid("token balance would overflow"))?;
        Ok(self.0)
    }

    /// Fails with `InsufficientFunds` and leaves the balance untouched when
    /// `amount` exceeds it.
    pub fn debit(&mut self, amount: u64) -> Result<u64, LedgerError> {
        self.0 = self
            .0
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                balance: self.0,
                requested: amount,
            })?;
        Ok(self.0)
    }

    /// Signed form of [`credit`](Self::credit) / [`debit`](Self::debit).
    pub fn adjust(&mut self, delta: i64) -> Result<u64, LedgerError> {
        if delta >= 0 {
            self.credit(delta.unsigned_abs())
        } else {
            self.debit(delta.unsigned_abs())
        }
    }
}

impl std::fmt::Display for TokenBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_both_directions() {
        let mut b = TokenBalance::new(50);
        assert_eq!(b.adjust(5), Ok(55));
        assert_eq!(b.adjust(-30), Ok(25));
        assert_eq!(b.get(), 25);
    }

    #[test]
    fn test_debit_to_exactly_zero() {
        let mut b = TokenBalance::new(25);
        assert_eq!(b.debit(25), Ok(0));
    }

    #[test]
    fn test_overdraft_rejected_and_unchanged() {
        let mut b = TokenBalance::new(25);
        assert_eq!(
            b.adjust(-60),
            Err(LedgerError::InsufficientFunds {
                balance: 25,
                requested: 60
            })
        );
        assert_eq!(b.get(), 25);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut b = TokenBalance::new(u64::MAX);
        assert!(matches!(b.credit(1), Err(LedgerError::InvalidArgument(_))));
        assert_eq!(b.get(), u64::MAX);
    }

    #[test]
    fn test_i64_min_delta() {
        let mut b = TokenBalance::new(u64::MAX);
        assert_eq!(b.adjust(i64::MIN), Ok(u64::MAX - (1u64 << 63)));
    }
}
