//! Staff login email.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors from [`Email::parse`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must contain exactly one @")]
    BadAtSign,
    #[error("email cannot contain whitespace")]
    Whitespace,
    #[error("email needs a name before the @ and a domain like example.com after it")]
    BadParts,
}

/// A staff member's login email.
///
/// Trimmed and lower-cased on parse so `Chef@Cafe.com` and `chef@cafe.com`
/// are the same account. Validation is structural only: one `@`, a
/// non-empty name, and a dotted domain.
///
/// ```
/// use tableside_core::Email;
///
/// assert_eq!(Email::parse(" Chef@Cafe.Example ").unwrap().as_str(), "chef@cafe.example");
/// assert!(Email::parse("chef@localhost").is_err());
/// assert!(Email::parse("a@b@c.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 path limit.
    pub const MAX_LENGTH: usize = 254;

    /// Validate and normalize an address.
    ///
    /// # Errors
    ///
    /// Returns the [`EmailError`] for the first rule the input breaks.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::BadAtSign)?;
        if domain.contains('@') {
            return Err(EmailError::BadAtSign);
        }
        let dotted = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
        if local.is_empty() || !dotted {
            return Err(EmailError::BadParts);
        }

        Ok(Self(s.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Session payloads and API bodies go through the same validation.
impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_addresses() {
        for ok in [
            "owner@cafe.example",
            "night.manager+till2@bistro.co.uk",
            "a@b.c",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_normalizes() {
        let email = Email::parse("  Owner@Cafe.Example ").unwrap();
        assert_eq!(email.as_str(), "owner@cafe.example");
        assert_eq!(email.to_string(), "owner@cafe.example");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(Email::parse("no-at-sign"), Err(EmailError::BadAtSign));
        assert_eq!(Email::parse("a@b@cafe.example"), Err(EmailError::BadAtSign));
        assert_eq!(Email::parse("chef @cafe.example"), Err(EmailError::Whitespace));
        assert_eq!(Email::parse("@cafe.example"), Err(EmailError::BadParts));
        assert_eq!(Email::parse("chef@"), Err(EmailError::BadParts));
        assert_eq!(Email::parse("chef@localhost"), Err(EmailError::BadParts));
        assert_eq!(Email::parse("chef@cafe..example"), Err(EmailError::BadParts));

        let long = format!("{}@cafe.example", "a".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong { max: 254 }));
    }

    #[test]
    fn test_deserialize_validates() {
        let email: Email = serde_json::from_str("\"Chef@Cafe.Example\"").unwrap();
        assert_eq!(email.as_str(), "chef@cafe.example");
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"chef@cafe.example\"");
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
    }
}
