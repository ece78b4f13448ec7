use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::input;

/// Citizen-supplied profile fields. Carried on the account document but
/// never part of the integrity chain or the balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub birthday: String,
    pub occupation: String,
    pub location: String,
    pub category: String,
    pub auth_provider: String,
}

impl Profile {
    /// The fields the sign-up flow asks the citizen to fill in.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.birthday.is_empty() && !self.occupation.is_empty()
    }
}

/// Partial update; absent fields are left as they are. `email` and
/// `auth_provider` belong to the identity provider and are not updatable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub birthday: Option<String>,
    pub occupation: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
}

impl ProfileUpdate {
    fn fields(&self) -> [(&'static str, Option<&String>); 5] {
        [
            ("username", self.username.as_ref()),
            ("birthday", self.birthday.as_ref()),
            ("occupation", self.occupation.as_ref()),
            ("location", self.location.as_ref()),
            ("category", self.category.as_ref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.is_empty() {
            return Err(LedgerError::invalid("profile update has no fields"));
        }
        for (name, value) in self.fields() {
            if let Some(v) = value {
                input::optional_text(name, v.trim())?;
            }
        }
        Ok(())
    }

    /// Apply trimmed values. Returns whether anything changed.
    pub fn apply(&self, profile: &mut Profile) -> bool {
        let mut changed = false;
        let mut set = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                let v = v.trim();
                if slot != v {
                    *slot = v.to_string();
                    changed = true;
                }
            }
        };
        set(&mut profile.username, &self.username);
        set(&mut profile.birthday, &self.birthday);
        set(&mut profile.occupation, &self.occupation);
        set(&mut profile.location, &self.location);
        set(&mut profile.category, &self.category);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut profile = Profile {
            username: "Asha".into(),
            location: "Pune".into(),
            ..Profile::default()
        };
        let update = ProfileUpdate {
            occupation: Some("  Student ".into()),
            ..ProfileUpdate::default()
        };
        assert!(update.apply(&mut profile));
        assert_eq!(profile.occupation, "Student");
        assert_eq!(profile.username, "Asha");
        assert_eq!(profile.location, "Pune");
    }

    #[test]
    fn test_noop_update_reports_unchanged() {
        let mut profile = Profile {
            username: "Asha".into(),
            ..Profile::default()
        };
        let update = ProfileUpdate {
            username: Some("Asha".into()),
            ..ProfileUpdate::default()
        };
        assert!(!update.apply(&mut profile));
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        assert!(ProfileUpdate::default().validate().is_err());
        let big = ProfileUpdate {
            username: Some("n".repeat(input::MAX_TEXT_LEN + 1)),
            ..ProfileUpdate::default()
        };
        assert!(big.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let parsed: Result<ProfileUpdate, _> =
            serde_json::from_str(r#"{"username":"a","tokens":9999}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_identity_fields_not_updatable() {
        for body in [
            r#"{"email":"someone@else.org"}"#,
            r#"{"username":"a","auth_provider":"password"}"#,
        ] {
            let parsed: Result<ProfileUpdate, _> = serde_json::from_str(body);
            assert!(parsed.is_err(), "{} should be refused", body);
        }
    }

    #[test]
    fn test_completeness() {
        let mut profile = Profile::default();
        assert!(!profile.is_complete());
        profile.username = "Asha".into();
        profile.birthday = "2004-01-26".into();
        profile.occupation = "Student".into();
        assert!(profile.is_complete());
    }
}
