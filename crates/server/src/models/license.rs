//! License domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tableside_core::{LicenseDeviceId, LicenseId, LicensePlan, LicenseStatus, StoreId};

/// A license sold to a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub store_id: StoreId,
    pub key: String,
    pub plan: LicensePlan,
    pub status: LicenseStatus,
    /// Number of distinct terminals allowed to activate this key.
    pub max_devices: i32,
    /// `None` means the license does not expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    /// Whether the license has passed its expiry date at `now`.
    #[must_use]
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// A terminal registered against a license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseDevice {
    pub id: LicenseDeviceId,
    pub license_id: LicenseId,
    /// SHA-256 (hex) of the fingerprint the terminal reported.
    pub fingerprint_hash: String,
    pub name: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Body of `POST /api/licenses`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueLicenseInput {
    pub store_id: StoreId,
    #[serde(default)]
    pub plan: LicensePlan,
    pub max_devices: i32,
    pub expires_at: Option<DateTime<Utc>>,
}
