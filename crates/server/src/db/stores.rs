//! Store repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use tableside_core::StoreId;

use super::RepositoryError;
use crate::models::store::{Store, UpdateStoreInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: i32,
    name: String,
    slug: String,
    currency: String,
    tax_rate: Decimal,
    low_stock_threshold: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: StoreId::new(row.id),
            name: row.name,
            slug: row.slug,
            currency: row.currency,
            tax_rate: row.tax_rate,
            low_stock_threshold: row.low_stock_threshold,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const STORE_COLUMNS: &str = "id, name, slug, currency, tax_rate, low_stock_threshold, \
                             is_active, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for store (tenant) database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        name: &str,
        slug: &str,
        currency: &str,
        tax_rate: Decimal,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO pos.store (name, slug, currency, tax_rate) \
             VALUES ($1, $2, $3, $4) RETURNING {STORE_COLUMNS}"
        ))
        .bind(name)
        .bind(slug)
        .bind(currency)
        .bind(tax_rate)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "store slug already exists"))?;

        Ok(row.into())
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM pos.store WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a store by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Store>, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM pos.store WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List every active store, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Store>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM pos.store WHERE is_active ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Apply an owner's settings change. Unset fields keep their value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update(
        &self,
        id: StoreId,
        input: &UpdateStoreInput,
    ) -> Result<Store, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "UPDATE pos.store SET \
                 name = COALESCE($2, name), \
                 currency = COALESCE($3, currency), \
                 tax_rate = COALESCE($4, tax_rate), \
                 low_stock_threshold = COALESCE($5, low_stock_threshold), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {STORE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.as_deref())
        .bind(input.currency.as_deref())
        .bind(input.tax_rate)
        .bind(input.low_stock_threshold)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }
}
