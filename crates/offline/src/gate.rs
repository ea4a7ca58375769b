//! Offline license check.
//!
//! The terminal keeps taking orders without the server as long as its cached
//! license token verifies against the server's public key, was issued to
//! this device, and has not been expired for longer than the grace period.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Serialize;

use tableside_core::{LICENSE_ISSUER, LicenseClaims, fingerprint_hash};

use crate::error::GateError;
use crate::store::LocalStore;

/// Default time a terminal keeps working after its token expired.
pub const DEFAULT_GRACE_DAYS: i64 = 7;

/// Whether the terminal may take orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LicenseState {
    /// Token is current.
    Valid { expires_at: DateTime<Utc> },
    /// Token expired; orders are still allowed for `days_left` more days.
    Grace { days_left: i64 },
}

/// Verifies the cached license token without network access.
pub struct LicenseGate {
    store: LocalStore,
    decoding: DecodingKey,
    fingerprint_hash: String,
    grace: Duration,
}

impl std::fmt::Debug for LicenseGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseGate")
            .field("fingerprint_hash", &self.fingerprint_hash)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl LicenseGate {
    /// Create a gate for this device.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Key` if `public_pem` is not an RSA public key.
    pub fn new(store: LocalStore, public_pem: &str, fingerprint: &str) -> Result<Self, GateError> {
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| GateError::Key(e.to_string()))?;
        Ok(Self {
            store,
            decoding,
            fingerprint_hash: fingerprint_hash(fingerprint),
            grace: Duration::days(DEFAULT_GRACE_DAYS),
        })
    }

    /// Override the grace period.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Check the stored token at `now`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Missing` before activation, `Invalid` for a bad
    /// signature or issuer, `DeviceMismatch` for another device's token and
    /// `Expired` once the grace period is over.
    pub async fn check(&self, now: DateTime<Utc>) -> Result<LicenseState, GateError> {
        let license = self.store.license().await?.ok_or(GateError::Missing)?;
        self.evaluate(&license.token, now)
    }

    /// Check a token at `now` without touching the store.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn evaluate(&self, token: &str, now: DateTime<Utc>) -> Result<LicenseState, GateError> {
        let claims = self.verify(token)?;
        if claims.fp != self.fingerprint_hash {
            return Err(GateError::DeviceMismatch);
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| GateError::Invalid("exp out of range".to_string()))?;
        if now <= expires_at {
            return Ok(LicenseState::Valid { expires_at });
        }

        let grace_ends = expires_at + self.grace;
        if now <= grace_ends {
            let remaining = grace_ends - now;
            // Partial days count as a whole day left.
            let days_left = (remaining.num_seconds() + 86_399) / 86_400;
            return Ok(LicenseState::Grace { days_left });
        }

        Err(GateError::Expired { expired_at: expires_at })
    }

    fn verify(&self, token: &str) -> Result<LicenseClaims, GateError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[LICENSE_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is judged against the grace period below.
        validation.validate_exp = false;

        jsonwebtoken::decode::<LicenseClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| GateError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use jsonwebtoken::{EncodingKey, Header};

    use tableside_core::{LicenseId, LicensePlan, StoreId};

    use super::*;

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/license_private.pem");
    const PUBLIC_PEM: &str = include_str!("../tests/fixtures/license_public.pem");
    const FOREIGN_PRIVATE_PEM: &str = include_str!("../tests/fixtures/foreign_private.pem");

    fn claims(fingerprint: &str, exp: DateTime<Utc>) -> LicenseClaims {
        LicenseClaims {
            iss: LICENSE_ISSUER.to_string(),
            sub: "ABCD-EFGH-JKLM-NPQR".to_string(),
            lic: LicenseId::new(1),
            store: StoreId::new(7),
            plan: LicensePlan::Basic,
            fp: fingerprint_hash(fingerprint),
            max_devices: 2,
            iat: (exp - Duration::days(30)).timestamp(),
            exp: exp.timestamp(),
        }
    }

    fn sign(claims: &LicenseClaims, private_pem: &str) -> String {
        let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
    }

    async fn gate() -> LicenseGate {
        let store = LocalStore::open_in_memory().await.unwrap();
        LicenseGate::new(store, PUBLIC_PEM, "till-1").unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_valid_token() {
        let gate = gate().await;
        let exp = at("2026-06-30T00:00:00Z");
        let token = sign(&claims("till-1", exp), PRIVATE_PEM);

        let state = gate.evaluate(&token, at("2026-06-01T12:00:00Z")).unwrap();
        assert_eq!(state, LicenseState::Valid { expires_at: exp });
    }

    #[tokio::test]
    async fn test_grace_period() {
        let gate = gate().await;
        let token = sign(&claims("till-1", at("2026-06-30T00:00:00Z")), PRIVATE_PEM);

        let state = gate.evaluate(&token, at("2026-07-01T00:00:00Z")).unwrap();
        assert_eq!(state, LicenseState::Grace { days_left: 6 });

        let state = gate.evaluate(&token, at("2026-07-06T12:00:00Z")).unwrap();
        assert_eq!(state, LicenseState::Grace { days_left: 1 });
    }

    #[tokio::test]
    async fn test_expired_after_grace() {
        let gate = gate().await;
        let token = sign(&claims("till-1", at("2026-06-30T00:00:00Z")), PRIVATE_PEM);

        let err = gate.evaluate(&token, at("2026-07-08T00:00:01Z")).unwrap_err();
        assert!(matches!(err, GateError::Expired { .. }));

        let strict = gate.with_grace(Duration::zero());
        assert!(matches!(
            strict.evaluate(&token, at("2026-06-30T00:00:01Z")),
            Err(GateError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn test_device_mismatch() {
        let gate = gate().await;
        let token = sign(&claims("till-2", at("2026-06-30T00:00:00Z")), PRIVATE_PEM);
        assert!(matches!(
            gate.evaluate(&token, at("2026-06-01T00:00:00Z")),
            Err(GateError::DeviceMismatch)
        ));
    }

    #[tokio::test]
    async fn test_rejects_foreign_and_tampered_tokens() {
        let gate = gate().await;
        let now = at("2026-06-01T00:00:00Z");

        let foreign = sign(&claims("till-1", at("2026-06-30T00:00:00Z")), FOREIGN_PRIVATE_PEM);
        assert!(matches!(gate.evaluate(&foreign, now), Err(GateError::Invalid(_))));

        let mut wrong_issuer = claims("till-1", at("2026-06-30T00:00:00Z"));
        wrong_issuer.iss = "someone-else".to_string();
        let token = sign(&wrong_issuer, PRIVATE_PEM);
        assert!(matches!(gate.evaluate(&token, now), Err(GateError::Invalid(_))));

        let token = sign(&claims("till-1", at("2026-06-30T00:00:00Z")), PRIVATE_PEM);
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = {
            let original = claims("till-1", at("2027-06-30T00:00:00Z"));
            let json = serde_json::to_vec(&original).unwrap();
            URL_SAFE_NO_PAD.encode(&json)
        };
        parts[1] = &forged_payload;
        let tampered = parts.join(".");
        assert!(matches!(gate.evaluate(&tampered, now), Err(GateError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_check_reads_stored_token() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let gate = LicenseGate::new(store.clone(), PUBLIC_PEM, "till-1").unwrap();
        let now = at("2026-06-01T00:00:00Z");

        assert!(matches!(gate.check(now).await, Err(GateError::Missing)));

        let token = sign(&claims("till-1", at("2026-06-30T00:00:00Z")), PRIVATE_PEM);
        store.save_license("ABCD-EFGH-JKLM-NPQR", "till-1", &token).await.unwrap();
        assert!(matches!(gate.check(now).await, Ok(LicenseState::Valid { .. })));
    }

    #[tokio::test]
    async fn test_bad_public_key() {
        let store = LocalStore::open_in_memory().await.unwrap();
        assert!(matches!(
            LicenseGate::new(store, "not a key", "till-1"),
            Err(GateError::Key(_))
        ));
    }
}
