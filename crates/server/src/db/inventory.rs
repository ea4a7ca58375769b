//! Inventory ledger repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tableside_core::{InventoryMovementId, ProductId, StoreId, UserId};

use super::RepositoryError;
use crate::models::inventory::{InventoryItem, InventoryMovement};

#[derive(Debug, sqlx::FromRow)]
struct InventoryItemRow {
    id: i32,
    name: String,
    sku: Option<String>,
    stock_quantity: i32,
    is_low_stock: bool,
}

impl From<InventoryItemRow> for InventoryItem {
    fn from(row: InventoryItemRow) -> Self {
        Self {
            product_id: ProductId::new(row.id),
            name: row.name,
            sku: row.sku,
            stock_quantity: row.stock_quantity,
            is_low_stock: row.is_low_stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: i32,
    store_id: i32,
    product_id: i32,
    delta: i32,
    reason: String,
    user_id: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for InventoryMovement {
    fn from(row: MovementRow) -> Self {
        Self {
            id: InventoryMovementId::new(row.id),
            store_id: StoreId::new(row.store_id),
            product_id: ProductId::new(row.product_id),
            delta: row.delta,
            reason: row.reason,
            user_id: row.user_id.map(UserId::new),
            created_at: row.created_at,
        }
    }
}

/// Repository for stock levels and movements.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stock of every active tracked product, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_tracked(&self, store_id: StoreId) -> Result<Vec<InventoryItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryItemRow>(
            r"
            SELECT p.id, p.name, p.sku, p.stock_quantity,
                   p.stock_quantity <= s.low_stock_threshold AS is_low_stock
            FROM pos.product p
            JOIN pos.store s ON s.id = p.store_id
            WHERE p.store_id = $1 AND p.track_inventory AND p.is_active
            ORDER BY p.stock_quantity, p.name
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Movement history of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn movements(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, RepositoryError> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r"
            SELECT id, store_id, product_id, delta, reason, user_id, created_at
            FROM pos.inventory_movement
            WHERE store_id = $1 AND product_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            ",
        )
        .bind(store_id)
        .bind(product_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Append a movement to the ledger.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn record_movement(
    conn: &mut PgConnection,
    store_id: StoreId,
    product_id: ProductId,
    delta: i32,
    reason: &str,
    user_id: Option<UserId>,
) -> Result<InventoryMovement, RepositoryError> {
    let row = sqlx::query_as::<_, MovementRow>(
        r"
        INSERT INTO pos.inventory_movement (store_id, product_id, delta, reason, user_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, store_id, product_id, delta, reason, user_id, created_at
        ",
    )
    .bind(store_id)
    .bind(product_id)
    .bind(delta)
    .bind(reason)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}
