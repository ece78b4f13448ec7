// Commands that never touch the network.

use chrono::{DateTime, Utc};
use colored::*;
use mitra_core::next_hash;
use mitra_crypto::{IdentitySecret, IdentityVerifier};

use crate::{print_info, print_success, HashCommands, IdentityCommands};

pub fn handle_identity(action: IdentityCommands) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        IdentityCommands::Issue {
            subject,
            email,
            secret,
            issuer,
            ttl,
        } => {
            let verifier = IdentityVerifier::new(IdentitySecret::new(&secret)?, issuer);
            let token = verifier.issue(&subject, email.as_deref(), ttl)?;
            print_success(&format!("Token for {} (valid {}s)", subject, ttl));
            println!("{}", token);
            print_info("export MITRA_TOKEN=<token> to use it with the other commands");
        }
    }
    Ok(())
}

pub fn handle_hash(action: HashCommands) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        HashCommands::Next {
            prior,
            scheme,
            label,
            at,
        } => {
            let millis = parse_millis(&at)?;
            let hash = next_hash(&prior, &scheme, &label, millis)?;
            println!("{}", hash.bold());
        }
    }
    Ok(())
}

/// Accepts Unix milliseconds or an RFC 3339 timestamp.
fn parse_millis(at: &str) -> Result<i64, String> {
    if let Ok(millis) = at.parse::<i64>() {
        return Ok(millis);
    }
    DateTime::parse_from_rfc3339(at)
        .map(|t| t.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| format!("cannot parse {:?} as millis or RFC 3339: {}", at, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millis_forms_agree() {
        assert_eq!(parse_millis("1760000000000").unwrap(), 1_760_000_000_000);
        assert_eq!(
            parse_millis("2025-10-09T08:53:20Z").unwrap(),
            1_760_000_000_000
        );
        assert_eq!(
            parse_millis("2025-10-09T14:23:20+05:30").unwrap(),
            1_760_000_000_000
        );
        assert!(parse_millis("yesterday").is_err());
    }
}
