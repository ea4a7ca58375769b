//! Order repository.
//!
//! Multi-statement writes (creation, status changes, terminal upserts) are
//! driven by `services::orders` and `services::sync`, which call the
//! transaction helpers below on one connection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use tableside_core::{
    OrderId, OrderItemId, OrderSource, OrderStatus, OrderTotals, PaymentMethod, ProductId,
    StoreId, TableId, UserId,
};
use uuid::Uuid;

use super::RepositoryError;
use crate::models::order::{Order, OrderFilter, OrderItem, OrderWithItems};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    store_id: i32,
    table_id: Option<i32>,
    user_id: Option<i32>,
    order_number: i32,
    status: OrderStatus,
    payment_method: Option<PaymentMethod>,
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
    notes: Option<String>,
    source: OrderSource,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            store_id: StoreId::new(row.store_id),
            table_id: row.table_id.map(TableId::new),
            user_id: row.user_id.map(UserId::new),
            order_number: row.order_number,
            status: row.status,
            payment_method: row.payment_method,
            subtotal: row.subtotal,
            tax: row.tax,
            total: row.total,
            notes: row.notes,
            source: row.source,
            created_at: row.created_at,
            updated_at: row.updated_at,
            paid_at: row.paid_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: Uuid,
    product_id: Option<i32>,
    name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
    notes: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            name: row.name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
            notes: row.notes,
        }
    }
}

const ORDER_COLUMNS: &str = "id, store_id, table_id, user_id, order_number, status, \
                             payment_method, subtotal, tax, total, notes, source, \
                             created_at, updated_at, paid_at";
const ITEM_COLUMNS: &str =
    "id, order_id, product_id, name, unit_price, quantity, line_total, notes";

// =============================================================================
// Write Types
// =============================================================================

/// A priced line about to be written.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub notes: Option<String>,
}

/// An order header about to be inserted or upserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub store_id: StoreId,
    pub table_id: Option<TableId>,
    pub user_id: Option<UserId>,
    pub order_number: i32,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub totals: OrderTotals,
    pub notes: Option<String>,
    pub source: OrderSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Read side of orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM pos.order WHERE store_id = "));
        query.push_bind(store_id);
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(table_id) = filter.table_id {
            query.push(" AND table_id = ").push_bind(table_id);
        }
        if let Some(from) = filter.from {
            query.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND created_at < ").push_bind(to);
        }
        query
            .push(" ORDER BY created_at DESC, order_number DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let rows = query
            .build_query_as::<OrderRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an order of a store with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_with_items(
        &self,
        store_id: StoreId,
        id: OrderId,
    ) -> Result<Option<OrderWithItems>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_with_items(&mut conn, store_id, id).await
    }

    /// Every order of a store with its lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn export_all(&self, store_id: StoreId) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM pos.order WHERE store_id = $1 ORDER BY created_at"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT i.id, i.order_id, i.product_id, i.name, i.unit_price, i.quantity,
                   i.line_total, i.notes
            FROM pos.order_item i
            JOIN pos.order o ON o.id = i.order_id
            WHERE o.store_id = $1
            ORDER BY i.id
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item.into());
        }

        Ok(orders
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                OrderWithItems {
                    order: row.into(),
                    items,
                }
            })
            .collect())
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Reserve the next per-store order number.
///
/// Locks the store row so concurrent creations in the same store serialize.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the store does not exist.
pub async fn next_order_number(
    conn: &mut PgConnection,
    store_id: StoreId,
) -> Result<i32, RepositoryError> {
    let locked: Option<i32> =
        sqlx::query_scalar("SELECT id FROM pos.store WHERE id = $1 FOR UPDATE")
            .bind(store_id)
            .fetch_optional(&mut *conn)
            .await?;
    if locked.is_none() {
        return Err(RepositoryError::NotFound);
    }

    let next: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(order_number), 0) + 1 FROM pos.order WHERE store_id = $1",
    )
    .bind(store_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(next)
}

/// Lock an order of a store for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM pos.order WHERE id = $1 AND store_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// The store an order id belongs to, if the order exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn owner_store(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<StoreId>, RepositoryError> {
    let store: Option<i32> = sqlx::query_scalar("SELECT store_id FROM pos.order WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(store.map(StoreId::new))
}

/// Get an order with its lines on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_with_items(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: OrderId,
) -> Result<Option<OrderWithItems>, RepositoryError> {
    let Some(order) = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM pos.order WHERE id = $1 AND store_id = $2"
    ))
    .bind(id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM pos.order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(OrderWithItems {
        order: order.into(),
        items: items.into_iter().map(Into::into).collect(),
    }))
}

/// Insert a new order header, or overwrite an existing one with the same id.
///
/// The order number and creator of an existing order are kept.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the statement fails.
pub async fn upsert(conn: &mut PgConnection, order: &NewOrder) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO pos.order \
             (id, store_id, table_id, user_id, order_number, status, payment_method, \
              subtotal, tax, total, notes, source, created_at, updated_at, paid_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (id) DO UPDATE SET \
             table_id = EXCLUDED.table_id, \
             status = EXCLUDED.status, \
             payment_method = EXCLUDED.payment_method, \
             subtotal = EXCLUDED.subtotal, \
             tax = EXCLUDED.tax, \
             total = EXCLUDED.total, \
             notes = EXCLUDED.notes, \
             updated_at = EXCLUDED.updated_at, \
             paid_at = EXCLUDED.paid_at \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order.id)
    .bind(order.store_id)
    .bind(order.table_id)
    .bind(order.user_id)
    .bind(order.order_number)
    .bind(order.status)
    .bind(order.payment_method)
    .bind(order.totals.subtotal)
    .bind(order.totals.tax)
    .bind(order.totals.total)
    .bind(order.notes.as_deref())
    .bind(order.source)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.paid_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Replace the lines of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a statement fails.
pub async fn replace_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<Vec<OrderItem>, RepositoryError> {
    sqlx::query("DELETE FROM pos.order_item WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO pos.order_item \
             (order_id, product_id, name, unit_price, quantity, line_total, notes) ",
    );
    query.push_values(items, |mut row, item| {
        row.push_bind(order_id)
            .push_bind(item.product_id)
            .push_bind(item.name.clone())
            .push_bind(item.unit_price)
            .push_bind(item.quantity)
            .push_bind(item.line_total)
            .push_bind(item.notes.clone());
    });
    query.push(format!(" RETURNING {ITEM_COLUMNS}"));

    let rows = query
        .build_query_as::<OrderItemRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Change the status of an order.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order is not in the store.
pub async fn set_status(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: OrderId,
    status: OrderStatus,
    payment_method: Option<PaymentMethod>,
    paid_at: Option<DateTime<Utc>>,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "UPDATE pos.order SET \
             status = $3, \
             payment_method = COALESCE($4, payment_method), \
             paid_at = COALESCE($5, paid_at), \
             updated_at = NOW() \
         WHERE id = $1 AND store_id = $2 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(store_id)
    .bind(status)
    .bind(payment_method)
    .bind(paid_at)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Into::into).ok_or(RepositoryError::NotFound)
}
