//! Backup record repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tableside_core::{BackupId, StoreId};

use super::RepositoryError;
use crate::models::backup::{Backup, BackupTrigger};

#[derive(Debug, sqlx::FromRow)]
struct BackupRow {
    id: i32,
    store_id: i32,
    file_name: String,
    size_bytes: i64,
    trigger: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BackupRow> for Backup {
    type Error = RepositoryError;

    fn try_from(row: BackupRow) -> Result<Self, Self::Error> {
        let trigger = match row.trigger.as_str() {
            "manual" => BackupTrigger::Manual,
            "cron" => BackupTrigger::Cron,
            other => {
                return Err(RepositoryError::DataCorruption(format!(
                    "invalid backup trigger: {other}"
                )));
            }
        };

        Ok(Self {
            id: BackupId::new(row.id),
            store_id: StoreId::new(row.store_id),
            file_name: row.file_name,
            size_bytes: row.size_bytes,
            trigger,
            created_at: row.created_at,
        })
    }
}

/// Repository for backup records.
pub struct BackupRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BackupRepository<'a> {
    /// Create a new backup repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a produced backup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &self,
        store_id: StoreId,
        file_name: &str,
        size_bytes: i64,
        trigger: BackupTrigger,
    ) -> Result<Backup, RepositoryError> {
        let row = sqlx::query_as::<_, BackupRow>(
            r"
            INSERT INTO pos.backup (store_id, file_name, size_bytes, trigger)
            VALUES ($1, $2, $3, $4)
            RETURNING id, store_id, file_name, size_bytes, trigger, created_at
            ",
        )
        .bind(store_id)
        .bind(file_name)
        .bind(size_bytes)
        .bind(trigger.as_str())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Backup records of a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId, limit: i64) -> Result<Vec<Backup>, RepositoryError> {
        let rows = sqlx::query_as::<_, BackupRow>(
            r"
            SELECT id, store_id, file_name, size_bytes, trigger, created_at
            FROM pos.backup
            WHERE store_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(store_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
