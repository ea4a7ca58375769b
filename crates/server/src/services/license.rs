//! Licensing: token signing, key issuance, terminal validation and the
//! expiry sweep.
//!
//! A validated terminal receives an RS256 token whose payload is
//! [`LicenseClaims`]. The terminal verifies it offline with the public key
//! and presents it as a bearer token when syncing.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use axum::http::StatusCode;
use tableside_core::{
    LICENSE_ISSUER, LicenseClaims, LicenseKey, LicenseKeyError, LicensePlan, LicenseStatus,
    LicenseSummary, LicenseValidationRequest, LicenseValidationResponse, MAX_FINGERPRINT_LEN,
    NotificationKind, StoreId, fingerprint_hash,
};

use crate::config::LicenseKeysConfig;
use crate::db::RepositoryError;
use crate::db::licenses::{self, LicenseRepository};
use crate::db::notifications;
use crate::models::license::License;
use crate::models::notification::NewNotification;

/// How far ahead of expiry stores are warned.
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Attempts at drawing an unused key before giving up.
const KEY_GENERATION_ATTEMPTS: usize = 5;

/// Alphabet for generated keys; omits `0`, `1`, `I` and `O`.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Errors that can occur during licensing operations.
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("license key is malformed")]
    InvalidKeyFormat,

    #[error("license not found")]
    NotFound,

    #[error("license is suspended")]
    Suspended,

    #[error("license is revoked")]
    Revoked,

    #[error("license has expired")]
    Expired,

    #[error("device limit reached for this license")]
    DeviceLimitReached,

    #[error("device fingerprint must be 1-{MAX_FINGERPRINT_LEN} characters")]
    InvalidFingerprint,

    #[error("device is not registered for this license")]
    DeviceNotRegistered,

    #[error("invalid license token: {0}")]
    InvalidToken(String),

    #[error("cannot change a {from} license to {to}")]
    InvalidTransition {
        from: LicenseStatus,
        to: LicenseStatus,
    },

    #[error("{0}")]
    InvalidInput(String),

    #[error("could not generate an unused license key")]
    KeyCollision,

    #[error("license signing key error: {0}")]
    Key(String),

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<LicenseKeyError> for LicenseError {
    fn from(_: LicenseKeyError) -> Self {
        Self::InvalidKeyFormat
    }
}

impl LicenseError {
    /// Stable machine-readable code returned to terminals.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidKeyFormat => "invalid_key_format",
            Self::NotFound => "not_found",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::DeviceLimitReached => "device_limit_reached",
            Self::InvalidFingerprint => "invalid_fingerprint",
            Self::DeviceNotRegistered => "device_not_registered",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidInput(_) => "invalid_input",
            Self::KeyCollision | Self::Key(_) | Self::Signing(_) | Self::Repository(_) => {
                "internal_error"
            }
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidKeyFormat | Self::InvalidFingerprint | Self::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound | Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Suspended
            | Self::Revoked
            | Self::Expired
            | Self::DeviceLimitReached
            | Self::DeviceNotRegistered => StatusCode::FORBIDDEN,
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidTransition { .. } | Self::Repository(RepositoryError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            Self::KeyCollision | Self::Key(_) | Self::Signing(_) | Self::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// =============================================================================
// Signing
// =============================================================================

/// Signs and verifies license tokens (RS256).
#[derive(Clone)]
pub struct LicenseSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for LicenseSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseSigner")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl LicenseSigner {
    /// Load a PEM key pair.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::Key` if either key is not a valid RSA PEM.
    pub fn from_pem(private_pem: &str, public_pem: &str, ttl: Duration) -> Result<Self, LicenseError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| LicenseError::Key(format!("private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| LicenseError::Key(format!("public key: {e}")))?;
        Ok(Self {
            encoding,
            decoding,
            ttl,
        })
    }

    /// Load the key pair from server configuration.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::Key` if either key is not a valid RSA PEM.
    pub fn from_config(config: &LicenseKeysConfig) -> Result<Self, LicenseError> {
        Self::from_pem(
            config.private_key_pem.expose_secret(),
            &config.public_key_pem,
            Duration::days(config.token_ttl_days),
        )
    }

    /// Lifetime of an issued token.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a claims payload.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::Signing` if encoding fails.
    pub fn sign(&self, claims: &LicenseClaims) -> Result<String, LicenseError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            claims,
            &self.encoding,
        )?)
    }

    /// Verify a token's signature, issuer and expiry.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::InvalidToken` on any verification failure.
    pub fn verify(&self, token: &str) -> Result<LicenseClaims, LicenseError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[LICENSE_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        jsonwebtoken::decode::<LicenseClaims>(token.trim(), &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| LicenseError::InvalidToken(e.to_string()))
    }

    /// Build the claims for a device of a license at `now`.
    #[must_use]
    pub fn claims_for(&self, license: &License, fingerprint_hash: &str, now: DateTime<Utc>) -> LicenseClaims {
        LicenseClaims {
            iss: LICENSE_ISSUER.to_string(),
            sub: license.key.clone(),
            lic: license.id,
            store: license.store_id,
            plan: license.plan,
            fp: fingerprint_hash.to_string(),
            max_devices: license.max_devices,
            iat: now.timestamp(),
            exp: token_expiry(license.expires_at, now, self.ttl).timestamp(),
        }
    }
}

// =============================================================================
// Pure decision helpers
// =============================================================================

/// What to do with the presenting device once the license is in good standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    /// Already registered; mark it seen.
    Touch,
    /// New device with a free slot; register it.
    Register,
}

/// Check a license's status and expiry at `now`.
///
/// # Errors
///
/// Returns the refusal matching the license's state. An `active` license past
/// its expiry yields `LicenseError::Expired`.
pub fn check_standing(license: &License, now: DateTime<Utc>) -> Result<(), LicenseError> {
    match license.status {
        LicenseStatus::Suspended => Err(LicenseError::Suspended),
        LicenseStatus::Revoked => Err(LicenseError::Revoked),
        LicenseStatus::Expired => Err(LicenseError::Expired),
        LicenseStatus::Active if license.is_past_expiry(now) => Err(LicenseError::Expired),
        LicenseStatus::Active => Ok(()),
    }
}

/// Decide whether a device may use the license.
///
/// # Errors
///
/// Returns `LicenseError::DeviceLimitReached` when a new device finds no free slot.
pub fn device_action(
    registered: bool,
    registered_count: i64,
    max_devices: i32,
) -> Result<DeviceAction, LicenseError> {
    if registered {
        Ok(DeviceAction::Touch)
    } else if registered_count < i64::from(max_devices) {
        Ok(DeviceAction::Register)
    } else {
        Err(LicenseError::DeviceLimitReached)
    }
}

/// Token expiry: the earlier of the license expiry and `now + ttl`.
#[must_use]
pub fn token_expiry(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let cap = now + ttl;
    expires_at.map_or(cap, |exp| exp.min(cap))
}

/// Validate and hash a device fingerprint (SHA-256, lower-case hex).
///
/// # Errors
///
/// Returns `LicenseError::InvalidFingerprint` for empty or oversized input.
pub fn hash_fingerprint(fingerprint: &str) -> Result<String, LicenseError> {
    let fingerprint = fingerprint.trim();
    if fingerprint.is_empty() || fingerprint.chars().count() > MAX_FINGERPRINT_LEN {
        return Err(LicenseError::InvalidFingerprint);
    }
    Ok(fingerprint_hash(fingerprint))
}

/// Draw a random license key.
#[must_use]
pub fn generate_key<R: Rng + ?Sized>(rng: &mut R) -> LicenseKey {
    let groups: Vec<String> = (0..LicenseKey::GROUPS)
        .map(|_| {
            (0..LicenseKey::GROUP_LEN)
                .map(|_| char::from(KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())]))
                .collect()
        })
        .collect();
    // The alphabet and shape always satisfy the key format.
    LicenseKey::parse(&groups.join("-")).unwrap_or_else(|_| unreachable!("generated key is well-formed"))
}

// =============================================================================
// Service
// =============================================================================

/// Outcome of a sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    /// Licenses newly marked expired.
    pub expired: usize,
    /// Stores warned about an upcoming expiry.
    pub warned: usize,
}

/// Licensing service.
pub struct LicenseService<'a> {
    pool: &'a PgPool,
    signer: &'a LicenseSigner,
}

impl<'a> LicenseService<'a> {
    /// Create a new licensing service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, signer: &'a LicenseSigner) -> Self {
        Self { pool, signer }
    }

    /// Validate a terminal's key and fingerprint, registering the device if
    /// it has a free slot, and return a signed token.
    ///
    /// # Errors
    ///
    /// Returns the `LicenseError` naming the first failed check.
    #[instrument(skip(self, request), fields(device = ?request.device_name))]
    pub async fn validate(
        &self,
        request: &LicenseValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<LicenseValidationResponse, LicenseError> {
        let key = LicenseKey::parse(&request.key)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let license = licenses::lock_by_key(&mut tx, key.as_str())
            .await?
            .ok_or(LicenseError::NotFound)?;

        if let Err(refusal) = check_standing(&license, now) {
            if matches!(refusal, LicenseError::Expired) && license.status == LicenseStatus::Active {
                licenses::set_status(&mut tx, license.id, LicenseStatus::Expired).await?;
                tx.commit().await.map_err(RepositoryError::from)?;
                tracing::info!(license = %key.masked(), "license expired on validation");
            }
            return Err(refusal);
        }

        let fingerprint_hash = hash_fingerprint(&request.fingerprint)?;
        let device_name = request
            .device_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let touched =
            licenses::touch_device(&mut tx, license.id, &fingerprint_hash, device_name).await?;
        let registered_count = licenses::count_devices(&mut tx, license.id).await?;
        let active_devices = match device_action(touched.is_some(), registered_count, license.max_devices)? {
            DeviceAction::Touch => registered_count,
            DeviceAction::Register => {
                licenses::register_device(&mut tx, license.id, &fingerprint_hash, device_name)
                    .await?;
                tracing::info!(license = %key.masked(), "registered new device");
                registered_count + 1
            }
        };

        let claims = self.signer.claims_for(&license, &fingerprint_hash, now);
        let token = self.signer.sign(&claims)?;
        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(LicenseValidationResponse {
            valid: true,
            reason: None,
            token: Some(token),
            license: Some(LicenseSummary {
                license_id: license.id,
                store_id: license.store_id,
                plan: license.plan,
                expires_at: license.expires_at,
                max_devices: license.max_devices,
                active_devices,
            }),
        })
    }

    /// Issue a new license with a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::InvalidInput` for a non-positive device cap or a
    /// past expiry, and `LicenseError::KeyCollision` if no unused key was found.
    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        store_id: StoreId,
        plan: LicensePlan,
        max_devices: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<License, LicenseError> {
        if max_devices < 1 {
            return Err(LicenseError::InvalidInput(
                "max_devices must be at least 1".to_string(),
            ));
        }
        if expires_at.is_some_and(|exp| exp <= Utc::now()) {
            return Err(LicenseError::InvalidInput(
                "expires_at must be in the future".to_string(),
            ));
        }

        let repo = LicenseRepository::new(self.pool);
        for attempt in 1..=KEY_GENERATION_ATTEMPTS {
            let key = generate_key(&mut rand::rng());
            match repo
                .create(store_id, key.as_str(), plan, max_devices, expires_at)
                .await
            {
                Ok(license) => {
                    tracing::info!(license_id = %license.id, key = %key.masked(), "issued license");
                    return Ok(license);
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(attempt, "license key collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LicenseError::KeyCollision)
    }

    /// Move a license to another status.
    ///
    /// Allowed: `active -> suspended`, `suspended -> active`, and anything
    /// except `revoked -> revoked` into `revoked`. Reactivating a license
    /// past its expiry is refused.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::InvalidTransition` for any other move.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        license_id: tableside_core::LicenseId,
        to: LicenseStatus,
    ) -> Result<License, LicenseError> {
        let repo = LicenseRepository::new(self.pool);
        let license = repo.get(license_id).await?.ok_or(LicenseError::NotFound)?;

        let allowed = match (license.status, to) {
            (LicenseStatus::Active, LicenseStatus::Suspended) => true,
            (LicenseStatus::Suspended, LicenseStatus::Active) => !license.is_past_expiry(Utc::now()),
            (from, LicenseStatus::Revoked) => from != LicenseStatus::Revoked,
            _ => false,
        };
        if !allowed {
            return Err(LicenseError::InvalidTransition {
                from: license.status,
                to,
            });
        }

        let updated = repo.set_status(license_id, to).await?;
        tracing::info!(license_id = %license_id, from = %license.status, to = %to, "license status changed");
        Ok(updated)
    }

    /// Expire overdue licenses and warn stores about upcoming expiries.
    ///
    /// Each license is warned at most once per day.
    ///
    /// # Errors
    ///
    /// Returns `LicenseError::Repository` if a query fails.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, LicenseError> {
        let repo = LicenseRepository::new(self.pool);
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;

        let expired = repo.expire_overdue(now).await?;
        for license in &expired {
            let key = LicenseKey::parse(&license.key).map_or_else(|_| license.key.clone(), |k| k.masked());
            notifications::create(
                &mut conn,
                &NewNotification::store_wide(
                    license.store_id,
                    NotificationKind::LicenseExpired,
                    "License expired",
                    format!("License {key} has expired. Terminals will stop working once their grace period ends."),
                ),
            )
            .await?;
        }

        let expiring = repo
            .claim_expiry_notices(now, now + Duration::days(EXPIRY_WARNING_DAYS), now - Duration::days(1))
            .await?;
        for license in &expiring {
            let key = LicenseKey::parse(&license.key).map_or_else(|_| license.key.clone(), |k| k.masked());
            let days_left = license
                .expires_at
                .map_or(0, |exp| (exp - now).num_days().max(0));
            notifications::create(
                &mut conn,
                &NewNotification::store_wide(
                    license.store_id,
                    NotificationKind::LicenseExpiring,
                    "License expiring soon",
                    format!("License {key} expires in {days_left} day(s)."),
                ),
            )
            .await?;
        }

        let report = SweepReport {
            expired: expired.len(),
            warned: expiring.len(),
        };
        tracing::info!(expired = report.expired, warned = report.warned, "license sweep finished");
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use tableside_core::LicenseId;

    use super::*;

    const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/license_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/license_public.pem");
    const FOREIGN_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/foreign_private.pem");
    const FOREIGN_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/foreign_public.pem");

    fn signer() -> LicenseSigner {
        LicenseSigner::from_pem(PRIVATE_PEM, PUBLIC_PEM, Duration::days(30)).unwrap()
    }

    fn license(status: LicenseStatus, expires_at: Option<DateTime<Utc>>) -> License {
        let now = Utc::now();
        License {
            id: LicenseId::new(7),
            store_id: StoreId::new(3),
            key: "ABCD-EFGH-JKLM-NPQR".to_string(),
            plan: LicensePlan::Pro,
            status,
            max_devices: 2,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = signer();
        let now = Utc::now();
        let claims = signer.claims_for(&license(LicenseStatus::Active, None), "ab12", now);
        let token = signer.sign(&claims).unwrap();
        assert_eq!(signer.verify(&token).unwrap(), claims);
    }

    #[test]
    fn test_verify_rejects_foreign_signature() {
        let foreign =
            LicenseSigner::from_pem(FOREIGN_PRIVATE_PEM, FOREIGN_PUBLIC_PEM, Duration::days(30)).unwrap();
        let claims = foreign.claims_for(&license(LicenseStatus::Active, None), "ab12", Utc::now());
        let token = foreign.sign(&claims).unwrap();
        assert!(matches!(signer().verify(&token), Err(LicenseError::InvalidToken(_))));
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let signer = signer();
        let claims = signer.claims_for(&license(LicenseStatus::Active, None), "ab12", Utc::now());
        let token = signer.sign(&claims).unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut forged = claims;
        forged.max_devices = 99;
        let payload = serde_json::to_vec(&forged).unwrap();
        parts[1] = URL_SAFE_NO_PAD.encode(&payload);
        assert!(signer.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let signer = signer();
        let mut claims = signer.claims_for(&license(LicenseStatus::Active, None), "ab12", Utc::now());
        claims.exp = Utc::now().timestamp() - 60;
        let token = signer.sign(&claims).unwrap();
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let signer = signer();
        let mut claims = signer.claims_for(&license(LicenseStatus::Active, None), "ab12", Utc::now());
        claims.iss = "someone-else".to_string();
        let token = signer.sign(&claims).unwrap();
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn test_token_expiry_is_capped_by_license() {
        let now = Utc::now();
        let soon = now + Duration::days(3);
        assert_eq!(token_expiry(Some(soon), now, Duration::days(30)), soon);
        assert_eq!(token_expiry(None, now, Duration::days(30)), now + Duration::days(30));
        let later = now + Duration::days(365);
        assert_eq!(token_expiry(Some(later), now, Duration::days(30)), now + Duration::days(30));
    }

    #[test]
    fn test_check_standing() {
        let now = Utc::now();
        assert!(check_standing(&license(LicenseStatus::Active, None), now).is_ok());
        assert!(matches!(
            check_standing(&license(LicenseStatus::Suspended, None), now),
            Err(LicenseError::Suspended)
        ));
        assert!(matches!(
            check_standing(&license(LicenseStatus::Revoked, None), now),
            Err(LicenseError::Revoked)
        ));
        assert!(matches!(
            check_standing(&license(LicenseStatus::Active, Some(now - Duration::seconds(1))), now),
            Err(LicenseError::Expired)
        ));
        assert!(matches!(
            check_standing(&license(LicenseStatus::Active, Some(now)), now),
            Err(LicenseError::Expired)
        ));
    }

    #[test]
    fn test_device_action() {
        assert_eq!(device_action(true, 2, 2).unwrap(), DeviceAction::Touch);
        assert_eq!(device_action(false, 1, 2).unwrap(), DeviceAction::Register);
        assert!(matches!(
            device_action(false, 2, 2),
            Err(LicenseError::DeviceLimitReached)
        ));
    }

    #[test]
    fn test_hash_fingerprint() {
        let hash = hash_fingerprint("terminal-01").unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_fingerprint("  terminal-01 ").unwrap());
        assert!(matches!(hash_fingerprint("  "), Err(LicenseError::InvalidFingerprint)));
        assert!(matches!(
            hash_fingerprint(&"x".repeat(MAX_FINGERPRINT_LEN + 1)),
            Err(LicenseError::InvalidFingerprint)
        ));
    }

    #[test]
    fn test_generate_key_is_well_formed() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let key = generate_key(&mut rng);
            assert!(LicenseKey::parse(key.as_str()).is_ok());
            assert!(!key.as_str().contains(['0', '1', 'I', 'O']));
        }
    }

    #[test]
    fn test_error_codes_and_status() {
        assert_eq!(LicenseError::InvalidKeyFormat.code(), "invalid_key_format");
        assert_eq!(LicenseError::InvalidKeyFormat.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(LicenseError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(LicenseError::DeviceLimitReached.code(), "device_limit_reached");
        assert_eq!(LicenseError::DeviceLimitReached.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(LicenseError::Expired.status_code(), StatusCode::FORBIDDEN);
    }
}
