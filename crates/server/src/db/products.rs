//! Product repository for database operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tableside_core::{ProductId, StoreId};

use super::RepositoryError;
use crate::models::product::{CreateProductInput, Product, UpdateProductInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    store_id: i32,
    name: String,
    sku: Option<String>,
    category: Option<String>,
    price: Decimal,
    track_inventory: bool,
    stock_quantity: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            sku: row.sku,
            category: row.category,
            price: row.price,
            track_inventory: row.track_inventory,
            stock_quantity: row.stock_quantity,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, store_id, name, sku, category, price, track_inventory, \
                               stock_quantity, is_active, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's products, optionally including deactivated ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        include_inactive: bool,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM pos.product \
             WHERE store_id = $1 AND (is_active OR $2) \
             ORDER BY category NULLS LAST, name"
        ))
        .bind(store_id)
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM pos.product WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is already used in the store.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &CreateProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO pos.product \
                 (store_id, name, sku, category, price, track_inventory, stock_quantity) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(store_id)
        .bind(&input.name)
        .bind(input.sku.as_deref())
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(input.track_inventory)
        .bind(input.stock_quantity)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "sku already exists"))?;

        Ok(row.into())
    }

    /// Update a product. Unset fields keep their value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    /// Returns `RepositoryError::Conflict` if the new SKU is already used.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: ProductId,
        input: &UpdateProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE pos.product SET \
                 name = COALESCE($3, name), \
                 sku = COALESCE($4, sku), \
                 category = COALESCE($5, category), \
                 price = COALESCE($6, price), \
                 track_inventory = COALESCE($7, track_inventory), \
                 is_active = COALESCE($8, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 AND store_id = $2 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.name.as_deref())
        .bind(input.sku.as_deref())
        .bind(input.category.as_deref())
        .bind(input.price)
        .bind(input.track_inventory)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "sku already exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a product so it drops out of the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    pub async fn deactivate(&self, store_id: StoreId, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE pos.product SET is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND store_id = $2",
        )
        .bind(id)
        .bind(store_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Load the given products of a store, locking their rows for the rest of the
/// transaction. Products outside the store are silently absent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_many(
    conn: &mut PgConnection,
    store_id: StoreId,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM pos.product \
         WHERE store_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE"
    ))
    .bind(store_id)
    .bind(&raw)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Add `delta` to a product's stock and return the new level.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product is not in the store.
pub async fn add_stock(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: ProductId,
    delta: i32,
) -> Result<i32, RepositoryError> {
    let stock: Option<i32> = sqlx::query_scalar(
        "UPDATE pos.product SET stock_quantity = stock_quantity + $3, updated_at = NOW() \
         WHERE id = $1 AND store_id = $2 RETURNING stock_quantity",
    )
    .bind(id)
    .bind(store_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    stock.ok_or(RepositoryError::NotFound)
}
