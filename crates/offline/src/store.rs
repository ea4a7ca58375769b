//! Terminal-side SQLite store.
//!
//! Holds the cached catalog, the activated license and every order taken on
//! this terminal. Orders start as `pending_sync` and are flipped to `synced`
//! or `sync_failed` by the [`Synchronizer`](crate::Synchronizer).

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqliteExecutor};
use tracing::instrument;

use tableside_core::{
    CatalogProduct, CatalogSnapshot, CatalogTable, OrderId, OrderLine, OrderStatus, OrderTotals,
    PaymentMethod, ProductId, StoreId, SyncOrder, SyncOrderItem, SyncStatus, TableId,
};

use crate::error::StoreError;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// =============================================================================
// Domain Types
// =============================================================================

/// License material saved by a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLicense {
    pub key: String,
    pub fingerprint: String,
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

/// A line of a new order; name and price come from the cached catalog.
#[derive(Debug, Clone)]
pub struct NewLocalItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub notes: Option<String>,
}

/// An order rung up on this terminal.
#[derive(Debug, Clone, Default)]
pub struct NewLocalOrder {
    pub table_id: Option<TableId>,
    pub notes: Option<String>,
    pub items: Vec<NewLocalItem>,
}

/// An order as held by the terminal.
#[derive(Debug, Clone, Serialize)]
pub struct LocalOrder {
    pub id: OrderId,
    pub table_id: Option<TableId>,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    pub items: Vec<SyncOrderItem>,
    pub totals: OrderTotals,
    /// Bumped on every local change.
    pub revision: i64,
    pub sync_status: SyncStatus,
    /// Server's reason when `sync_status` is `sync_failed`.
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl LocalOrder {
    /// The wire form pushed to `/api/sync/orders`.
    #[must_use]
    pub fn to_sync_order(&self) -> SyncOrder {
        SyncOrder {
            id: self.id,
            table_id: self.table_id,
            status: self.status,
            payment_method: self.payment_method,
            notes: self.notes.clone(),
            items: self.items.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
        }
    }
}

/// Number of orders per sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
}

// =============================================================================
// Internal Row Types
// =============================================================================

fn parse<T>(value: &str, what: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{what} {value:?}: {e}")))
}

fn parse_decimal(value: &str, what: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|e| StoreError::Corrupt(format!("{what} {value:?}: {e}")))
}

fn clean(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

#[derive(Debug, sqlx::FromRow)]
struct MetaRow {
    store_id: i32,
    currency: String,
    tax_rate: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    sku: Option<String>,
    category: Option<String>,
    price: String,
}

impl TryFrom<ProductRow> for CatalogProduct {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            price: parse_decimal(&row.price, "product price")?,
            name: row.name,
            sku: row.sku,
            category: row.category,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TableRow {
    id: i32,
    label: String,
    seats: i32,
    status: String,
}

impl TryFrom<TableRow> for CatalogTable {
    type Error = StoreError;

    fn try_from(row: TableRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: TableId::new(row.id),
            status: parse(&row.status, "table status")?,
            label: row.label,
            seats: row.seats,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LicenseRow {
    key: String,
    fingerprint: String,
    token: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    table_id: Option<i32>,
    status: String,
    payment_method: Option<String>,
    notes: Option<String>,
    subtotal: String,
    tax: String,
    total: String,
    revision: i64,
    sync_status: String,
    sync_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<SyncOrderItem>) -> Result<LocalOrder, StoreError> {
        Ok(LocalOrder {
            id: parse(&self.id, "order id")?,
            table_id: self.table_id.map(TableId::new),
            status: parse(&self.status, "order status")?,
            payment_method: self
                .payment_method
                .as_deref()
                .map(|m| parse(m, "payment method"))
                .transpose()?,
            notes: self.notes,
            items,
            totals: OrderTotals {
                subtotal: parse_decimal(&self.subtotal, "subtotal")?,
                tax: parse_decimal(&self.tax, "tax")?,
                total: parse_decimal(&self.total, "total")?,
            },
            revision: self.revision,
            sync_status: parse(&self.sync_status, "sync status")?,
            sync_error: self.sync_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            synced_at: self.synced_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    product_id: i32,
    name: String,
    unit_price: String,
    quantity: i32,
    notes: Option<String>,
}

impl TryFrom<ItemRow> for SyncOrderItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            unit_price: parse_decimal(&row.unit_price, "unit price")?,
            name: row.name,
            quantity: row.quantity,
            notes: row.notes,
        })
    }
}

const ORDER_COLUMNS: &str = "id, table_id, status, payment_method, notes, subtotal, tax, total, \
     revision, sync_status, sync_error, created_at, updated_at, paid_at, synced_at";

// =============================================================================
// Store
// =============================================================================

/// Handle to the terminal's SQLite database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open (creating if needed) the database file at `path` and migrate it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be opened or migrated.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::migrated(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be created or migrated.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Each in-memory connection is its own database, so keep exactly one
        // alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// Replace the cached catalog with a fresh snapshot from the server.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a write fails.
    #[instrument(skip(self, snapshot), fields(products = snapshot.products.len(), tables = snapshot.tables.len()))]
    pub async fn replace_catalog(&self, snapshot: &CatalogSnapshot) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM catalog_product").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM catalog_table").execute(&mut *tx).await?;
        sqlx::query(
            r"
            INSERT INTO catalog_meta (id, store_id, currency, tax_rate, fetched_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                store_id = excluded.store_id,
                currency = excluded.currency,
                tax_rate = excluded.tax_rate,
                fetched_at = excluded.fetched_at
            ",
        )
        .bind(snapshot.store_id.as_i32())
        .bind(&snapshot.currency)
        .bind(snapshot.tax_rate.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        for product in &snapshot.products {
            sqlx::query(
                "INSERT INTO catalog_product (id, name, sku, category, price) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(product.id.as_i32())
            .bind(&product.name)
            .bind(&product.sku)
            .bind(&product.category)
            .bind(product.price.to_string())
            .execute(&mut *tx)
            .await?;
        }

        for table in &snapshot.tables {
            sqlx::query("INSERT INTO catalog_table (id, label, seats, status) VALUES (?, ?, ?, ?)")
                .bind(table.id.as_i32())
                .bind(&table.label)
                .bind(table.seats)
                .bind(table.status.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!("catalog replaced");
        Ok(())
    }

    /// The cached catalog, or `None` before the first sync.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a query fails or a row is corrupt.
    pub async fn catalog(&self) -> Result<Option<CatalogSnapshot>, StoreError> {
        let Some(meta) = fetch_meta(&self.pool).await? else {
            return Ok(None);
        };

        let products = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, sku, category, price FROM catalog_product ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CatalogProduct::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let tables = sqlx::query_as::<_, TableRow>(
            "SELECT id, label, seats, status FROM catalog_table ORDER BY label, id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CatalogTable::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CatalogSnapshot {
            store_id: StoreId::new(meta.store_id),
            currency: meta.currency,
            tax_rate: parse_decimal(&meta.tax_rate, "tax rate")?,
            products,
            tables,
        }))
    }

    // -------------------------------------------------------------------------
    // License
    // -------------------------------------------------------------------------

    /// Save (or replace) the license this terminal activated with.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn save_license(&self, key: &str, fingerprint: &str, token: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO license (id, key, fingerprint, token, saved_at)
            VALUES (1, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                key = excluded.key,
                fingerprint = excluded.fingerprint,
                token = excluded.token,
                saved_at = excluded.saved_at
            ",
        )
        .bind(key)
        .bind(fingerprint)
        .bind(token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The saved license, if the terminal was activated.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn license(&self) -> Result<Option<StoredLicense>, StoreError> {
        let row = sqlx::query_as::<_, LicenseRow>(
            "SELECT key, fingerprint, token, saved_at FROM license WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoredLicense {
            key: r.key,
            fingerprint: r.fingerprint,
            token: r.token,
            saved_at: r.saved_at,
        }))
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Record a new order priced from the cached catalog.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoCatalog` before the first sync, and
    /// `UnknownProduct`/`UnknownTable`/`InvalidOrder` for bad input.
    #[instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn record_order(&self, input: &NewLocalOrder) -> Result<LocalOrder, StoreError> {
        let meta = fetch_meta(&self.pool).await?.ok_or(StoreError::NoCatalog)?;
        let tax_rate = parse_decimal(&meta.tax_rate, "tax rate")?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = sqlx::query_as::<_, ProductRow>(
                "SELECT id, name, sku, category, price FROM catalog_product WHERE id = ?",
            )
            .bind(item.product_id.as_i32())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::UnknownProduct(item.product_id))?;
            let product = CatalogProduct::try_from(product)?;

            items.push(SyncOrderItem {
                product_id: product.id,
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
                notes: clean(item.notes.as_deref()),
            });
        }

        if let Some(table_id) = input.table_id {
            let known: Option<i32> = sqlx::query_scalar("SELECT id FROM catalog_table WHERE id = ?")
                .bind(table_id.as_i32())
                .fetch_optional(&self.pool)
                .await?;
            if known.is_none() {
                return Err(StoreError::UnknownTable(table_id));
            }
        }

        let lines: Vec<OrderLine> = items.iter().map(SyncOrderItem::line).collect();
        let totals = OrderTotals::compute(&lines, tax_rate)?;

        let now = Utc::now();
        let order = LocalOrder {
            id: OrderId::generate(),
            table_id: input.table_id,
            status: OrderStatus::Open,
            payment_method: None,
            notes: clean(input.notes.as_deref()),
            items,
            totals,
            revision: 1,
            sync_status: SyncStatus::PendingSync,
            sync_error: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            synced_at: None,
        };

        let mut tx = self.pool.begin().await?;
        insert_order(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, total = %order.totals.total, "order recorded");
        Ok(order)
    }

    /// Move an order to another status and queue it for sync again.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::OrderNotFound`, `OrderClosed` for paid or
    /// cancelled orders, and `PaymentMethodRequired` when paying without one.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        payment_method: Option<PaymentMethod>,
    ) -> Result<LocalOrder, StoreError> {
        let order = self.get_order(id).await?.ok_or(StoreError::OrderNotFound(id))?;
        if order.status.is_terminal() {
            return Err(StoreError::OrderClosed(order.status));
        }
        let payment_method = payment_method.or(order.payment_method);
        if status == OrderStatus::Paid && payment_method.is_none() {
            return Err(StoreError::PaymentMethodRequired);
        }

        let now = Utc::now();
        let paid_at = if status == OrderStatus::Paid {
            Some(now)
        } else {
            order.paid_at
        };

        sqlx::query(
            r"
            UPDATE local_order
            SET status = ?, payment_method = ?, paid_at = ?, updated_at = ?,
                revision = revision + 1, sync_status = 'pending_sync', sync_error = NULL
            WHERE id = ?
            ",
        )
        .bind(status.as_str())
        .bind(payment_method.map(|m| m.as_str()))
        .bind(paid_at)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        self.get_order(id).await?.ok_or(StoreError::OrderNotFound(id))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a query fails or a row is corrupt.
    pub async fn get_order(&self, id: OrderId) -> Result<Option<LocalOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM local_order WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(with_items(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Oldest orders still waiting to be pushed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a query fails or a row is corrupt.
    pub async fn pending_orders(&self, limit: i64) -> Result<Vec<LocalOrder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM local_order \
             WHERE sync_status = 'pending_sync' \
             ORDER BY created_at, id LIMIT ?"
        ))
        .bind(limit.max(1))
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(with_items(&mut conn, row).await?);
        }
        Ok(orders)
    }

    /// Mark pushed orders as synced.
    ///
    /// Takes `(id, revision)` pairs of what was pushed; an order changed
    /// locally since then keeps `pending_sync`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a write fails.
    pub async fn mark_synced(&self, pushed: &[(OrderId, i64)]) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for (id, revision) in pushed {
            updated += sqlx::query(
                r"
                UPDATE local_order
                SET sync_status = 'synced', sync_error = NULL, synced_at = ?
                WHERE id = ? AND revision = ?
                ",
            )
            .bind(now)
            .bind(id.to_string())
            .bind(revision)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Mark an order the server rejected. It stays out of the pending set
    /// until [`requeue_failed`](Self::requeue_failed).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn mark_failed(&self, id: OrderId, revision: i64, reason: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE local_order
            SET sync_status = 'sync_failed', sync_error = ?
            WHERE id = ? AND revision = ?
            ",
        )
        .bind(reason)
        .bind(id.to_string())
        .bind(revision)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::warn!(order_id = %id, reason, "order rejected by server");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Put every failed order back into the pending set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn requeue_failed(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE local_order SET sync_status = 'pending_sync', sync_error = NULL \
             WHERE sync_status = 'sync_failed'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Orders per sync state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails or a status is unknown.
    pub async fn sync_counts(&self) -> Result<SyncCounts, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT sync_status, COUNT(*) FROM local_order GROUP BY sync_status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = SyncCounts::default();
        for (status, count) in rows {
            match parse::<SyncStatus>(&status, "sync status")? {
                SyncStatus::PendingSync => counts.pending = count,
                SyncStatus::Synced => counts.synced = count,
                SyncStatus::SyncFailed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}

async fn fetch_meta<'e>(executor: impl SqliteExecutor<'e>) -> Result<Option<MetaRow>, StoreError> {
    let meta = sqlx::query_as::<_, MetaRow>(
        "SELECT store_id, currency, tax_rate FROM catalog_meta WHERE id = 1",
    )
    .fetch_optional(executor)
    .await?;
    Ok(meta)
}

async fn with_items(conn: &mut SqliteConnection, row: OrderRow) -> Result<LocalOrder, StoreError> {
    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT product_id, name, unit_price, quantity, notes FROM local_order_item \
         WHERE order_id = ? ORDER BY position",
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(SyncOrderItem::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    row.into_order(items)
}

async fn insert_order(conn: &mut SqliteConnection, order: &LocalOrder) -> Result<(), StoreError> {
    let id = order.id.to_string();
    sqlx::query(&format!(
        "INSERT INTO local_order ({ORDER_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&id)
    .bind(order.table_id.map(|t| t.as_i32()))
    .bind(order.status.as_str())
    .bind(order.payment_method.map(|m| m.as_str()))
    .bind(&order.notes)
    .bind(order.totals.subtotal.to_string())
    .bind(order.totals.tax.to_string())
    .bind(order.totals.total.to_string())
    .bind(order.revision)
    .bind(order.sync_status.as_str())
    .bind(&order.sync_error)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.paid_at)
    .bind(order.synced_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO local_order_item (order_id, position, product_id, name, unit_price, quantity, notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(i64::try_from(position).unwrap_or(i64::MAX))
        .bind(item.product_id.as_i32())
        .bind(&item.name)
        .bind(item.unit_price.to_string())
        .bind(item.quantity)
        .bind(&item.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tableside_core::{MAX_LINE_QUANTITY, MoneyError};

    use super::*;
    use crate::test_support::snapshot;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn espresso_order(quantity: i32) -> NewLocalOrder {
        NewLocalOrder {
            table_id: Some(TableId::new(4)),
            notes: Some("  window seat ".to_string()),
            items: vec![NewLocalItem {
                product_id: ProductId::new(1),
                quantity,
                notes: None,
            }],
        }
    }

    async fn store_with_catalog() -> LocalStore {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.replace_catalog(&snapshot()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_catalog_round_trips_and_replaces() {
        let store = LocalStore::open_in_memory().await.unwrap();
        assert!(store.catalog().await.unwrap().is_none());

        store.replace_catalog(&snapshot()).await.unwrap();
        let cached = store.catalog().await.unwrap().unwrap();
        assert_eq!(cached.products.len(), 2);
        // Sorted by name
        assert_eq!(cached.products[0].name, "Croissant");
        assert_eq!(cached.tax_rate, dec("0.08"));

        let mut smaller = snapshot();
        smaller.products.truncate(1);
        smaller.tables.clear();
        store.replace_catalog(&smaller).await.unwrap();
        let cached = store.catalog().await.unwrap().unwrap();
        assert_eq!(cached.products.len(), 1);
        assert!(cached.tables.is_empty());
    }

    #[tokio::test]
    async fn test_record_order_needs_catalog() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let err = store.record_order(&espresso_order(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NoCatalog));
    }

    #[tokio::test]
    async fn test_record_order_prices_from_catalog() {
        let store = store_with_catalog().await;
        let order = store.record_order(&espresso_order(3)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.sync_status, SyncStatus::PendingSync);
        assert_eq!(order.notes.as_deref(), Some("window seat"));
        assert_eq!(order.items[0].name, "Espresso");
        assert_eq!(order.totals.subtotal, dec("7.50"));
        assert_eq!(order.totals.tax, dec("0.60"));
        assert_eq!(order.totals.total, dec("8.10"));

        let loaded = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded.items, order.items);
        assert_eq!(loaded.totals, order.totals);
    }

    #[tokio::test]
    async fn test_record_order_rejects_bad_input() {
        let store = store_with_catalog().await;

        let mut unknown_product = espresso_order(1);
        unknown_product.items[0].product_id = ProductId::new(99);
        assert!(matches!(
            store.record_order(&unknown_product).await.unwrap_err(),
            StoreError::UnknownProduct(_)
        ));

        let mut unknown_table = espresso_order(1);
        unknown_table.table_id = Some(TableId::new(99));
        assert!(matches!(
            store.record_order(&unknown_table).await.unwrap_err(),
            StoreError::UnknownTable(_)
        ));

        assert!(matches!(
            store.record_order(&espresso_order(0)).await.unwrap_err(),
            StoreError::InvalidOrder(_)
        ));
        assert!(matches!(
            store.record_order(&espresso_order(MAX_LINE_QUANTITY + 1)).await.unwrap_err(),
            StoreError::InvalidOrder(MoneyError::QuantityTooLarge { .. })
        ));
        assert_eq!(store.sync_counts().await.unwrap(), SyncCounts::default());
    }

    #[tokio::test]
    async fn test_synced_orders_leave_pending_set() {
        let store = store_with_catalog().await;
        let a = store.record_order(&espresso_order(1)).await.unwrap();
        let b = store.record_order(&espresso_order(2)).await.unwrap();

        let pending = store.pending_orders(100).await.unwrap();
        assert_eq!(pending.len(), 2);

        store.mark_synced(&[(a.id, a.revision)]).await.unwrap();
        let pending = store.pending_orders(100).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);

        let synced = store.get_order(a.id).await.unwrap().unwrap();
        assert_eq!(synced.sync_status, SyncStatus::Synced);
        assert!(synced.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_stale_revision_stays_pending() {
        let store = store_with_catalog().await;
        let order = store.record_order(&espresso_order(1)).await.unwrap();
        let pushed_revision = order.revision;

        store
            .update_order_status(order.id, OrderStatus::Preparing, None)
            .await
            .unwrap();

        assert_eq!(store.mark_synced(&[(order.id, pushed_revision)]).await.unwrap(), 0);
        assert_eq!(store.pending_orders(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_orders_can_be_requeued() {
        let store = store_with_catalog().await;
        let order = store.record_order(&espresso_order(1)).await.unwrap();

        let marked = store
            .mark_failed(order.id, order.revision, "product 1 is not in this store")
            .await
            .unwrap();
        assert!(marked);
        assert!(store.pending_orders(10).await.unwrap().is_empty());
        let failed = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(failed.sync_status, SyncStatus::SyncFailed);
        assert_eq!(failed.sync_error.as_deref(), Some("product 1 is not in this store"));

        assert_eq!(
            store.sync_counts().await.unwrap(),
            SyncCounts {
                pending: 0,
                synced: 0,
                failed: 1
            }
        );

        assert_eq!(store.requeue_failed().await.unwrap(), 1);
        assert_eq!(store.pending_orders(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_status_rules() {
        let store = store_with_catalog().await;
        let order = store.record_order(&espresso_order(1)).await.unwrap();
        store.mark_synced(&[(order.id, order.revision)]).await.unwrap();

        let err = store
            .update_order_status(order.id, OrderStatus::Paid, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PaymentMethodRequired));

        let paid = store
            .update_order_status(order.id, OrderStatus::Paid, Some(PaymentMethod::Card))
            .await
            .unwrap();
        assert_eq!(paid.sync_status, SyncStatus::PendingSync);
        assert_eq!(paid.revision, order.revision + 1);
        assert!(paid.paid_at.is_some());

        let err = store
            .update_order_status(order.id, OrderStatus::Cancelled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OrderClosed(OrderStatus::Paid)));

        let missing = OrderId::generate();
        assert!(matches!(
            store.update_order_status(missing, OrderStatus::Served, None).await.unwrap_err(),
            StoreError::OrderNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_license_is_replaced() {
        let store = LocalStore::open_in_memory().await.unwrap();
        assert!(store.license().await.unwrap().is_none());

        store.save_license("ABCD-EFGH-JKLM-NPQR", "fp-1", "token-1").await.unwrap();
        store.save_license("ABCD-EFGH-JKLM-NPQR", "fp-1", "token-2").await.unwrap();
        let license = store.license().await.unwrap().unwrap();
        assert_eq!(license.token, "token-2");
        assert_eq!(license.fingerprint, "fp-1");
    }

    #[tokio::test]
    async fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terminal.db");

        {
            let store = LocalStore::open(&path).await.unwrap();
            store.replace_catalog(&snapshot()).await.unwrap();
        }
        let reopened = LocalStore::open(&path).await.unwrap();
        assert!(reopened.catalog().await.unwrap().is_some());
    }
}
