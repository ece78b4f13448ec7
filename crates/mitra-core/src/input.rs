//! Request-shape checks run before any store access.

use crate::error::LedgerError;

pub const MAX_ID_LEN: usize = 128;
pub const MAX_TEXT_LEN: usize = 256;

/// Identifier: non-empty, bounded, no whitespace or control characters.
pub fn identifier(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.is_empty() {
        return Err(LedgerError::invalid(format!("{} is required", field)));
    }
    if value.len() > MAX_ID_LEN {
        return Err(LedgerError::invalid(format!(
            "{} exceeds {} bytes",
            field, MAX_ID_LEN
        )));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LedgerError::invalid(format!(
            "{} must not contain whitespace or control characters",
            field
        )));
    }
    Ok(())
}

/// Human-readable text: non-empty after trimming, bounded, no control chars.
pub fn text(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::invalid(format!("{} is required", field)));
    }
    optional_text(field, value)
}

/// Same bounds as [`text`] but empty is allowed.
pub fn optional_text(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.len() > MAX_TEXT_LEN {
        return Err(LedgerError::invalid(format!(
            "{} exceeds {} bytes",
            field, MAX_TEXT_LEN
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(LedgerError::invalid(format!(
            "{} must not contain control characters",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(identifier("scheme_id", "SCH-42").is_ok());
        assert!(identifier("scheme_id", "").is_err());
        assert!(identifier("scheme_id", "SCH 42").is_err());
        assert!(identifier("scheme_id", "SCH\u{0}").is_err());
        assert!(identifier("scheme_id", &"x".repeat(MAX_ID_LEN)).is_ok());
        assert!(identifier("scheme_id", &"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_text_rules() {
        assert!(text("label", "PM Scholarship").is_ok());
        assert!(text("label", "   ").is_err());
        assert!(text("label", "line\nbreak").is_err());
        assert!(text("label", &"y".repeat(MAX_TEXT_LEN + 1)).is_err());
        assert!(optional_text("birthday", "").is_ok());
    }
}
