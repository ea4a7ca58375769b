//! Database operations for the POS `PostgreSQL` database.
//!
//! # Schema: `pos`
//!
//! ## Tables
//!
//! - `store` - Tenants
//! - `user` - Staff accounts and platform super admins
//! - `product`, `inventory_movement` - Catalog and stock ledger
//! - `dining_table` - Floor plan
//! - `order`, `order_item` - Orders (UUID keys, upserted by terminals)
//! - `license`, `license_device` - Licensing
//! - `notification` - In-app notifications
//! - `backup` - Backup records
//! - `setting` - Per-store settings (JSONB)
//! - `session` - Session storage
//!
//! Every store-scoped query filters by `store_id`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p tableside-cli -- migrate
//! ```

pub mod backups;
pub mod inventory;
pub mod licenses;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod settings;
pub mod stores;
pub mod tables;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use backups::BackupRepository;
pub use inventory::InventoryRepository;
pub use licenses::LicenseRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use stores::StoreRepository;
pub use tables::TableRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to [`RepositoryError::Conflict`].
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        let unique = matches!(&err, sqlx::Error::Database(db_err) if db_err.is_unique_violation());
        if unique {
            Self::Conflict(what.to_string())
        } else {
            Self::Database(err)
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unique_keeps_other_errors() {
        let err = RepositoryError::from_unique(sqlx::Error::RowNotFound, "label");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }
}
