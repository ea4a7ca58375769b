//! Store snapshots: downloadable backups and the scheduled backup job.
//!
//! A snapshot is one JSON document holding everything a store owns. Password
//! hashes never leave the database and device fingerprints only exist as
//! hashes, so a snapshot is safe to hand to the store owner.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use tableside_core::{NotificationKind, StoreId};

use crate::config::BackupConfig;
use crate::db::RepositoryError;
use crate::db::backups::BackupRepository;
use crate::db::licenses::LicenseRepository;
use crate::db::notifications::NotificationRepository;
use crate::db::orders::OrderRepository;
use crate::db::products::ProductRepository;
use crate::db::settings::{self, SettingsError};
use crate::db::stores::StoreRepository;
use crate::db::tables::TableRepository;
use crate::db::users::UserRepository;
use crate::models::backup::{Backup, BackupTrigger};
use crate::models::license::{License, LicenseDevice};
use crate::models::notification::{NewNotification, Notification};
use crate::models::order::OrderWithItems;
use crate::models::product::Product;
use crate::models::store::Store;
use crate::models::table::DiningTable;
use crate::models::user::User;

/// Snapshot layout version.
pub const FORMAT_VERSION: u32 = 1;

/// Prefix of every backup file name.
const FILE_PREFIX: &str = "tableside-";

/// Errors that can occur while producing backups.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("store not found")]
    StoreNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("backup file error: {0}")]
    Io(#[from] std::io::Error),
}

/// A license with the devices registered against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseBackup {
    #[serde(flatten)]
    pub license: License,
    pub devices: Vec<LicenseDevice>,
}

/// Everything a store owns, as of `generated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub format_version: u32,
    pub generated_at: DateTime<Utc>,
    pub store: Store,
    pub users: Vec<User>,
    pub products: Vec<Product>,
    pub tables: Vec<DiningTable>,
    pub orders: Vec<OrderWithItems>,
    pub licenses: Vec<LicenseBackup>,
    pub notifications: Vec<Notification>,
    pub settings: serde_json::Map<String, JsonValue>,
}

impl BackupSnapshot {
    /// File name for this snapshot.
    #[must_use]
    pub fn file_name(&self) -> String {
        file_name(&self.store.slug, self.generated_at)
    }
}

/// `tableside-{slug}-{YYYYMMDDTHHMMSSZ}.json`
#[must_use]
pub fn file_name(slug: &str, at: DateTime<Utc>) -> String {
    format!("{FILE_PREFIX}{slug}-{}.json", at.format("%Y%m%dT%H%M%SZ"))
}

/// Outcome of a scheduled backup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRunReport {
    /// Active stores considered.
    pub stores: usize,
    /// Snapshots written.
    pub written: usize,
    /// Stores whose backup failed.
    pub failed: usize,
}

/// Backup service.
pub struct BackupService<'a> {
    pool: &'a PgPool,
}

impl<'a> BackupService<'a> {
    /// Create a new backup service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Collect a snapshot of a store.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::StoreNotFound` if the store does not exist.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, store_id: StoreId) -> Result<BackupSnapshot, BackupError> {
        let store = StoreRepository::new(self.pool)
            .get_by_id(store_id)
            .await?
            .ok_or(BackupError::StoreNotFound)?;

        let users = UserRepository::new(self.pool).list_for_store(store_id).await?;
        let products = ProductRepository::new(self.pool).list(store_id, true).await?;
        let tables = TableRepository::new(self.pool).list(store_id).await?;
        let orders = OrderRepository::new(self.pool).export_all(store_id).await?;
        let notifications = NotificationRepository::new(self.pool)
            .list_for_store(store_id)
            .await?;

        let license_repo = LicenseRepository::new(self.pool);
        let mut licenses = Vec::new();
        for license in license_repo.list(Some(store_id)).await? {
            let devices = license_repo.devices(license.id).await?;
            licenses.push(LicenseBackup { license, devices });
        }

        let settings = settings::list_settings(self.pool, store_id)
            .await?
            .into_iter()
            .collect();

        Ok(BackupSnapshot {
            format_version: FORMAT_VERSION,
            generated_at: Utc::now(),
            store,
            users,
            products,
            tables,
            orders,
            licenses,
            notifications,
            settings,
        })
    }

    /// Produce a snapshot for download and record it as a manual backup.
    ///
    /// Returns the file name and the serialized snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BackupError` if collecting or serializing fails.
    #[instrument(skip(self))]
    pub async fn download(&self, store_id: StoreId) -> Result<(String, Vec<u8>), BackupError> {
        let snapshot = self.snapshot(store_id).await?;
        let file_name = snapshot.file_name();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        BackupRepository::new(self.pool)
            .record(store_id, &file_name, byte_len(&bytes), BackupTrigger::Manual)
            .await?;
        tracing::info!(%store_id, file = %file_name, bytes = bytes.len(), "manual backup generated");

        Ok((file_name, bytes))
    }

    /// Backup records of a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Repository` if the query fails.
    pub async fn list(&self, store_id: StoreId, limit: i64) -> Result<Vec<Backup>, BackupError> {
        Ok(BackupRepository::new(self.pool).list(store_id, limit).await?)
    }

    /// Write a snapshot of one store under `config.dir` and prune old files.
    ///
    /// # Errors
    ///
    /// Returns `BackupError` if collecting, writing or recording fails.
    #[instrument(skip(self, config), fields(store = %store.slug))]
    pub async fn write_store(&self, store: &Store, config: &BackupConfig) -> Result<Backup, BackupError> {
        let snapshot = self.snapshot(store.id).await?;
        let file_name = snapshot.file_name();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let dir = config.dir.join(&store.slug);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&file_name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        let record = BackupRepository::new(self.pool)
            .record(store.id, &file_name, byte_len(&bytes), BackupTrigger::Cron)
            .await?;

        let pruned = prune(&dir, &store.slug, config.retention).await?;
        if !pruned.is_empty() {
            tracing::debug!(count = pruned.len(), "pruned old backups");
        }

        NotificationRepository::new(self.pool)
            .create(&NewNotification::store_wide(
                store.id,
                NotificationKind::BackupCompleted,
                "Backup completed",
                format!("Saved {file_name} ({} bytes).", bytes.len()),
            ))
            .await?;

        Ok(record)
    }

    /// Back up every active store. Per-store failures are logged and counted.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::Repository` if the store list cannot be loaded.
    #[instrument(skip(self, config))]
    pub async fn run_scheduled(&self, config: &BackupConfig) -> Result<BackupRunReport, BackupError> {
        let stores = StoreRepository::new(self.pool).list_active().await?;
        let mut report = BackupRunReport {
            stores: stores.len(),
            ..BackupRunReport::default()
        };

        for store in &stores {
            match self.write_store(store, config).await {
                Ok(_) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(store = %store.slug, error = %e, "scheduled backup failed");
                }
            }
        }

        tracing::info!(
            stores = report.stores,
            written = report.written,
            failed = report.failed,
            "scheduled backup finished"
        );
        Ok(report)
    }
}

fn byte_len(bytes: &[u8]) -> i64 {
    i64::try_from(bytes.len()).unwrap_or(i64::MAX)
}

/// Whether `name` is a backup file of `slug` (and not of a store whose slug
/// merely starts with it).
fn is_backup_of(name: &str, slug: &str) -> bool {
    let Some(rest) = name
        .strip_prefix(FILE_PREFIX)
        .and_then(|r| r.strip_prefix(slug))
        .and_then(|r| r.strip_prefix('-'))
        .and_then(|r| r.strip_suffix(".json"))
    else {
        return false;
    };
    NaiveDateTime::parse_from_str(rest, "%Y%m%dT%H%M%SZ").is_ok()
}

/// Delete all but the newest `keep` backup files of a store in `dir`.
///
/// Only files named like [`file_name`] for `slug` are considered; their
/// timestamps sort lexicographically. Returns the deleted paths.
///
/// # Errors
///
/// Returns `BackupError::Io` if the directory cannot be read or a file
/// cannot be removed.
pub async fn prune(dir: &Path, slug: &str, keep: usize) -> Result<Vec<PathBuf>, BackupError> {
    let mut files = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_backup_of(&name, slug) {
            files.push(name);
        }
    }

    files.sort_unstable_by(|a, b| b.cmp(a));
    let mut removed = Vec::new();
    for name in files.into_iter().skip(keep) {
        let path = dir.join(name);
        tokio::fs::remove_file(&path).await?;
        removed.push(path);
    }
    Ok(removed)
}
