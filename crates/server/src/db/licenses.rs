//! License and license device repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tableside_core::{LicenseDeviceId, LicenseId, LicensePlan, LicenseStatus, StoreId};

use super::RepositoryError;
use crate::models::license::{License, LicenseDevice};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct LicenseRow {
    id: i32,
    store_id: i32,
    key: String,
    plan: LicensePlan,
    status: LicenseStatus,
    max_devices: i32,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LicenseRow> for License {
    fn from(row: LicenseRow) -> Self {
        Self {
            id: LicenseId::new(row.id),
            store_id: StoreId::new(row.store_id),
            key: row.key,
            plan: row.plan,
            status: row.status,
            max_devices: row.max_devices,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: i32,
    license_id: i32,
    fingerprint_hash: String,
    name: Option<String>,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl From<DeviceRow> for LicenseDevice {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: LicenseDeviceId::new(row.id),
            license_id: LicenseId::new(row.license_id),
            fingerprint_hash: row.fingerprint_hash,
            name: row.name,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
        }
    }
}

const LICENSE_COLUMNS: &str =
    "id, store_id, key, plan, status, max_devices, expires_at, created_at, updated_at";
const DEVICE_COLUMNS: &str = "id, license_id, fingerprint_hash, name, first_seen_at, last_seen_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for licenses and their registered devices.
pub struct LicenseRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LicenseRepository<'a> {
    /// Create a new license repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List licenses, newest first. `None` lists every store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: Option<StoreId>) -> Result<Vec<License>, RepositoryError> {
        let rows = sqlx::query_as::<_, LicenseRow>(&format!(
            "SELECT {LICENSE_COLUMNS} FROM pos.license \
             WHERE ($1::INTEGER IS NULL OR store_id = $1) \
             ORDER BY created_at DESC"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a license by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: LicenseId) -> Result<Option<License>, RepositoryError> {
        let row = sqlx::query_as::<_, LicenseRow>(&format!(
            "SELECT {LICENSE_COLUMNS} FROM pos.license WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a license.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key already exists.
    pub async fn create(
        &self,
        store_id: StoreId,
        key: &str,
        plan: LicensePlan,
        max_devices: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<License, RepositoryError> {
        let row = sqlx::query_as::<_, LicenseRow>(&format!(
            "INSERT INTO pos.license (store_id, key, plan, max_devices, expires_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {LICENSE_COLUMNS}"
        ))
        .bind(store_id)
        .bind(key)
        .bind(plan)
        .bind(max_devices)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "license key already exists"))?;

        Ok(row.into())
    }

    /// Set a license's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the license does not exist.
    pub async fn set_status(
        &self,
        id: LicenseId,
        status: LicenseStatus,
    ) -> Result<License, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, id, status).await
    }

    /// Devices registered against a license, most recently seen first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn devices(&self, license_id: LicenseId) -> Result<Vec<LicenseDevice>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM pos.license_device \
             WHERE license_id = $1 ORDER BY last_seen_at DESC"
        ))
        .bind(license_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Look up a registered device by fingerprint hash and mark it seen.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn touch_device(
        &self,
        license_id: LicenseId,
        fingerprint_hash: &str,
    ) -> Result<Option<LicenseDevice>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        touch_device(&mut conn, license_id, fingerprint_hash, None).await
    }

    /// Unregister a device, freeing its slot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the device is not on the license.
    pub async fn remove_device(
        &self,
        license_id: LicenseId,
        device_id: LicenseDeviceId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM pos.license_device WHERE id = $1 AND license_id = $2")
            .bind(device_id)
            .bind(license_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark every active license past its expiry as expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<License>, RepositoryError> {
        let rows = sqlx::query_as::<_, LicenseRow>(&format!(
            "UPDATE pos.license SET status = 'expired', updated_at = NOW() \
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= $1 \
             RETURNING {LICENSE_COLUMNS}"
        ))
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Claim active licenses expiring before `until` that were not warned
    /// about since `noticed_before`, stamping the warning time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn claim_expiry_notices(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
        noticed_before: DateTime<Utc>,
    ) -> Result<Vec<License>, RepositoryError> {
        let rows = sqlx::query_as::<_, LicenseRow>(&format!(
            "UPDATE pos.license SET last_expiry_notice_at = $1 \
             WHERE status = 'active' \
               AND expires_at > $1 AND expires_at <= $2 \
               AND (last_expiry_notice_at IS NULL OR last_expiry_notice_at < $3) \
             RETURNING {LICENSE_COLUMNS}"
        ))
        .bind(now)
        .bind(until)
        .bind(noticed_before)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Lock a license by key for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_key(
    conn: &mut PgConnection,
    key: &str,
) -> Result<Option<License>, RepositoryError> {
    let row = sqlx::query_as::<_, LicenseRow>(&format!(
        "SELECT {LICENSE_COLUMNS} FROM pos.license WHERE key = $1 FOR UPDATE"
    ))
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Set a license's status.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the license does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: LicenseId,
    status: LicenseStatus,
) -> Result<License, RepositoryError> {
    let row = sqlx::query_as::<_, LicenseRow>(&format!(
        "UPDATE pos.license SET status = $2, updated_at = NOW() \
         WHERE id = $1 RETURNING {LICENSE_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}

/// Number of devices registered against a license.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_devices(
    conn: &mut PgConnection,
    license_id: LicenseId,
) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pos.license_device WHERE license_id = $1")
            .bind(license_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(count)
}

/// Mark a registered device as seen now. Returns `None` if it is not registered.
///
/// A provided `name` replaces the stored one.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn touch_device(
    conn: &mut PgConnection,
    license_id: LicenseId,
    fingerprint_hash: &str,
    name: Option<&str>,
) -> Result<Option<LicenseDevice>, RepositoryError> {
    let row = sqlx::query_as::<_, DeviceRow>(&format!(
        "UPDATE pos.license_device SET last_seen_at = NOW(), name = COALESCE($3, name) \
         WHERE license_id = $1 AND fingerprint_hash = $2 RETURNING {DEVICE_COLUMNS}"
    ))
    .bind(license_id)
    .bind(fingerprint_hash)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Register a new device against a license.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the device is already registered.
pub async fn register_device(
    conn: &mut PgConnection,
    license_id: LicenseId,
    fingerprint_hash: &str,
    name: Option<&str>,
) -> Result<LicenseDevice, RepositoryError> {
    let row = sqlx::query_as::<_, DeviceRow>(&format!(
        "INSERT INTO pos.license_device (license_id, fingerprint_hash, name) \
         VALUES ($1, $2, $3) RETURNING {DEVICE_COLUMNS}"
    ))
    .bind(license_id)
    .bind(fingerprint_hash)
    .bind(name)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "device already registered"))?;

    Ok(row.into())
}
