//! Backup record domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tableside_core::{BackupId, StoreId};

/// What produced a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupTrigger {
    /// Downloaded by an owner.
    Manual,
    /// Written to disk by the scheduled job.
    Cron,
}

impl BackupTrigger {
    /// Label stored in `pos.backup.trigger`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Cron => "cron",
        }
    }
}

impl fmt::Display for BackupTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record of a produced backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    pub store_id: StoreId,
    pub file_name: String,
    pub size_bytes: i64,
    pub trigger: BackupTrigger,
    pub created_at: DateTime<Utc>,
}
