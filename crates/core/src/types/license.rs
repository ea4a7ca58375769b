//! License keys and the signed license payload.
//!
//! A license key is what a store owner types into a terminal. The server
//! answers a successful validation with a token whose payload is
//! [`LicenseClaims`], signed with RSA-SHA256 (RS256). Terminals keep that
//! token and verify it offline with the public key.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::id::{LicenseId, StoreId};
use super::status::LicensePlan;

/// Issuer claim carried by every license token.
pub const LICENSE_ISSUER: &str = "tableside-licensing";

/// Errors that can occur when parsing a [`LicenseKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseKeyError {
    #[error("license key is required")]
    Empty,
    #[error("license key must look like XXXX-XXXX-XXXX-XXXX (A-Z, 0-9)")]
    InvalidFormat,
}

/// A normalized license key: four groups of four `[A-Z0-9]` characters.
///
/// ```
/// use tableside_core::LicenseKey;
///
/// let key = LicenseKey::parse(" ab12-cd34-ef56-gh78 ").unwrap();
/// assert_eq!(key.as_str(), "AB12-CD34-EF56-GH78");
/// assert!(LicenseKey::parse("AB12CD34").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Number of dash-separated groups.
    pub const GROUPS: usize = 4;
    /// Characters per group.
    pub const GROUP_LEN: usize = 4;

    /// Parse and normalize (trim, upper-case) a license key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseKeyError`] if the input is empty or malformed.
    pub fn parse(s: &str) -> Result<Self, LicenseKeyError> {
        let normalized = s.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(LicenseKeyError::Empty);
        }

        let groups: Vec<&str> = normalized.split('-').collect();
        let well_formed = groups.len() == Self::GROUPS
            && groups.iter().all(|g| {
                g.len() == Self::GROUP_LEN
                    && g.chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            });
        if !well_formed {
            return Err(LicenseKeyError::InvalidFormat);
        }

        Ok(Self(normalized))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a log-safe form that hides all but the last group.
    #[must_use]
    pub fn masked(&self) -> String {
        let last = self.0.rsplit('-').next().unwrap_or_default();
        format!("XXXX-XXXX-XXXX-{last}")
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LicenseKey {
    type Err = LicenseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LicenseKey {
    type Error = LicenseKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LicenseKey> for String {
    fn from(key: LicenseKey) -> Self {
        key.0
    }
}

/// The JSON payload signed into a license token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseClaims {
    /// Issuer; always [`LICENSE_ISSUER`].
    pub iss: String,
    /// The license key.
    pub sub: String,
    /// License row id.
    pub lic: LicenseId,
    /// Store the license belongs to.
    pub store: StoreId,
    /// Billing plan.
    pub plan: LicensePlan,
    /// [`fingerprint_hash`] of the device the token was issued to.
    pub fp: String,
    /// Device cap of the license at signing time.
    pub max_devices: i32,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Longest accepted device fingerprint, in characters.
pub const MAX_FINGERPRINT_LEN: usize = 256;

/// SHA-256 (lower-case hex) of a trimmed device fingerprint.
///
/// The server stores and signs this value and terminals compare against
/// it, so both sides must call this function.
#[must_use]
pub fn fingerprint_hash(fingerprint: &str) -> String {
    hex::encode(Sha256::digest(fingerprint.trim().as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let key = LicenseKey::parse("  abcd-1234-wxyz-9876\n").unwrap();
        assert_eq!(key.as_str(), "ABCD-1234-WXYZ-9876");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(LicenseKey::parse("   "), Err(LicenseKeyError::Empty));
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for bad in [
            "ABCD-1234-WXYZ",
            "ABCD-1234-WXYZ-98765",
            "ABCD_1234_WXYZ_9876",
            "ABCD-1234-WX!Z-9876",
            "ABCD-1234-WXYZ-9876-0000",
        ] {
            assert_eq!(
                LicenseKey::parse(bad),
                Err(LicenseKeyError::InvalidFormat),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_masked_hides_prefix() {
        let key = LicenseKey::parse("ABCD-1234-WXYZ-9876").unwrap();
        assert_eq!(key.masked(), "XXXX-XXXX-XXXX-9876");
    }

    #[test]
    fn test_fingerprint_hash_ignores_surrounding_whitespace() {
        let hash = fingerprint_hash("till-1");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hash, fingerprint_hash("  till-1\n"));
        assert_ne!(hash, fingerprint_hash("till-2"));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: LicenseKey = serde_json::from_str("\"abcd-1234-wxyz-9876\"").unwrap();
        assert_eq!(ok.as_str(), "ABCD-1234-WXYZ-9876");
        assert!(serde_json::from_str::<LicenseKey>("\"nope\"").is_err());
    }
}
