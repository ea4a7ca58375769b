//! Stock adjustments and low-stock alerts.

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use tableside_core::{NotificationKind, ProductId, StoreId, UserId};

use crate::db::RepositoryError;
use crate::db::inventory::{self, InventoryRepository};
use crate::db::notifications;
use crate::db::products::{self, ProductRepository};
use crate::db::stores::StoreRepository;
use crate::error::AppError;
use crate::models::inventory::{InventoryItem, InventoryMovement};
use crate::models::notification::NewNotification;
use crate::models::product::Product;

/// Longest accepted adjustment reason.
pub const MAX_REASON_LEN: usize = 200;

/// Whether a stock change crosses into the low-stock band.
///
/// Only the change that brings stock to or below the threshold alerts; later
/// sales while already low stay quiet.
#[must_use]
pub const fn crosses_low_stock(before: i32, after: i32, threshold: i32) -> bool {
    before > threshold && after <= threshold
}

/// Apply a stock change to a tracked product and write the ledger entry.
///
/// Creates a `low_stock` notification when the change crosses the store's
/// threshold. Returns the new stock level.
///
/// # Errors
///
/// Returns `RepositoryError` if a statement fails.
pub async fn apply_movement(
    conn: &mut PgConnection,
    product: &Product,
    delta: i32,
    reason: &str,
    user_id: Option<UserId>,
    low_stock_threshold: i32,
) -> Result<i32, RepositoryError> {
    let after = products::add_stock(conn, product.store_id, product.id, delta).await?;
    inventory::record_movement(conn, product.store_id, product.id, delta, reason, user_id).await?;

    let before = after - delta;
    if crosses_low_stock(before, after, low_stock_threshold) {
        tracing::info!(product_id = %product.id, stock = after, "product is low on stock");
        notifications::create(
            conn,
            &NewNotification::store_wide(
                product.store_id,
                NotificationKind::LowStock,
                format!("{} is running low", product.name),
                format!("Only {after} left in stock."),
            ),
        )
        .await?;
    }
    Ok(after)
}

/// Inventory service.
pub struct InventoryService<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryService<'a> {
    /// Create a new inventory service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stock levels of tracked products with their low-stock flag.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<InventoryItem>, AppError> {
        Ok(InventoryRepository::new(self.pool).list_tracked(store_id).await?)
    }

    /// Movement history of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is not in the store.
    pub async fn movements(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError> {
        ProductRepository::new(self.pool)
            .get(store_id, product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        Ok(InventoryRepository::new(self.pool)
            .movements(store_id, product_id, limit.clamp(1, 500))
            .await?)
    }

    /// Manually adjust stock by `delta`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a zero delta, an empty reason, an
    /// untracked product or a result below zero, and `AppError::NotFound` if
    /// the product is not in the store.
    #[instrument(skip(self, reason))]
    pub async fn adjust(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        delta: i32,
        reason: &str,
        user_id: UserId,
    ) -> Result<InventoryItem, AppError> {
        let reason = reason.trim();
        if delta == 0 {
            return Err(AppError::BadRequest("delta must not be zero".to_string()));
        }
        if reason.is_empty() || reason.chars().count() > MAX_REASON_LEN {
            return Err(AppError::BadRequest(format!(
                "reason must be 1-{MAX_REASON_LEN} characters"
            )));
        }

        let store = StoreRepository::new(self.pool)
            .get_by_id(store_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Store not found".to_string()))?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let product = products::lock_many(&mut tx, store_id, &[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        if !product.track_inventory {
            return Err(AppError::BadRequest(
                "product does not track inventory".to_string(),
            ));
        }
        let projected = i64::from(product.stock_quantity) + i64::from(delta);
        if projected < 0 {
            return Err(AppError::BadRequest(format!(
                "adjustment would leave {projected} in stock"
            )));
        }

        let stock = apply_movement(
            &mut tx,
            &product,
            delta,
            reason,
            Some(user_id),
            store.low_stock_threshold,
        )
        .await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(product_id = %product_id, delta, stock, "stock adjusted");

        Ok(InventoryItem {
            product_id,
            name: product.name,
            sku: product.sku,
            stock_quantity: stock,
            is_low_stock: stock <= store.low_stock_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crosses_low_stock() {
        assert!(crosses_low_stock(6, 5, 5));
        assert!(crosses_low_stock(20, 0, 5));
        assert!(crosses_low_stock(6, -2, 5));
        assert!(!crosses_low_stock(5, 4, 5));
        assert!(!crosses_low_stock(10, 7, 5));
        assert!(!crosses_low_stock(3, 9, 5));
    }
}
