//! Terminal sync: license-token authentication, catalog export and order
//! upserts.
//!
//! Terminals create orders while offline with their own ids and push them
//! later. Each pushed order is upserted in its own transaction so one bad
//! order never blocks the rest of the batch. Pushes are last-write-wins.

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::instrument;

use tableside_core::{
    CatalogProduct, CatalogSnapshot, CatalogTable, LicenseId, LicenseStatus, MAX_SYNC_BATCH,
    NotificationKind, OrderSource, OrderStatus, OrderTotals, ProductId, RejectedOrder, StoreId,
    SyncOrder, SyncOrderItem, SyncPushRequest, SyncPushResponse, TableId, TableStatus,
};

use crate::db::RepositoryError;
use crate::db::licenses::LicenseRepository;
use crate::db::notifications;
use crate::db::orders::{self, NewOrder, NewOrderItem};
use crate::db::products::{self, ProductRepository};
use crate::db::stores::StoreRepository;
use crate::db::tables::{self, TableRepository};
use crate::models::inventory::reasons;
use crate::models::notification::NewNotification;
use crate::models::product::Product;
use crate::models::store::Store;
use crate::services::inventory::apply_movement;
use crate::services::license::LicenseSigner;
use crate::services::orders::{MAX_NOTE_LEN, clean_note};

/// Errors that can occur while serving a terminal.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("missing license token")]
    MissingToken,

    #[error("invalid license token: {0}")]
    InvalidToken(String),

    #[error("license is {0}")]
    LicenseInactive(LicenseStatus),

    #[error("device is not registered for this license")]
    DeviceNotRegistered,

    #[error("at most {MAX_SYNC_BATCH} orders per push, got {0}")]
    BatchTooLarge(usize),

    #[error("store not found")]
    StoreNotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SyncError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::LicenseInactive(_) | Self::DeviceNotRegistered => StatusCode::FORBIDDEN,
            Self::BatchTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StoreNotFound | Self::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An authenticated terminal.
#[derive(Debug, Clone)]
pub struct Terminal {
    pub license_id: LicenseId,
    pub store_id: StoreId,
    pub fingerprint_hash: String,
}

/// Why a pushed order was refused, or the database error that stopped it.
enum PushFailure {
    Rejected(String),
    Repository(RepositoryError),
}

impl From<RepositoryError> for PushFailure {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) if is_data_exception(&e) => {
                Self::Rejected(format!("order data rejected by the database: {e}"))
            }
            other => Self::Repository(other),
        }
    }
}

impl From<sqlx::Error> for PushFailure {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// SQLSTATE class 22: the row itself is out of range or malformed, so
/// retrying the same order can never succeed.
fn is_data_exception(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().is_some_and(|code| code.starts_with("22")))
}

/// Check the parts of a pushed order that need no database.
///
/// # Errors
///
/// Returns the rejection reason.
pub fn check_pushed_order(order: &SyncOrder, tax_rate: Decimal) -> Result<OrderTotals, String> {
    let lines: Vec<_> = order.items.iter().map(SyncOrderItem::line).collect();
    let totals = OrderTotals::compute(&lines, tax_rate).map_err(|e| e.to_string())?;

    let notes = std::iter::once(order.notes.as_deref())
        .chain(order.items.iter().map(|i| i.notes.as_deref()));
    for note in notes {
        if clean_note(note).is_err() {
            return Err(format!("note must be at most {MAX_NOTE_LEN} characters"));
        }
    }
    if order.items.iter().any(|i| i.name.trim().is_empty()) {
        return Err("line name is required".to_string());
    }
    Ok(totals)
}

/// Payment timestamp to store for a pushed order.
#[must_use]
pub fn paid_at_for(order: &SyncOrder) -> Option<DateTime<Utc>> {
    if order.status == OrderStatus::Paid {
        Some(order.paid_at.unwrap_or(order.updated_at))
    } else {
        None
    }
}

/// Terminal sync service.
pub struct SyncService<'a> {
    pool: &'a PgPool,
    signer: &'a LicenseSigner,
}

impl<'a> SyncService<'a> {
    /// Create a new sync service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, signer: &'a LicenseSigner) -> Self {
        Self { pool, signer }
    }

    /// Authenticate a terminal by its license token.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidToken` for a bad token,
    /// `SyncError::LicenseInactive` when the license is no longer active and
    /// `SyncError::DeviceNotRegistered` when the device was removed.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Terminal, SyncError> {
        let claims = self
            .signer
            .verify(token)
            .map_err(|e| SyncError::InvalidToken(e.to_string()))?;

        let repo = LicenseRepository::new(self.pool);
        let license = repo
            .get(claims.lic)
            .await?
            .filter(|l| l.key == claims.sub && l.store_id == claims.store)
            .ok_or_else(|| SyncError::InvalidToken("unknown license".to_string()))?;

        if license.status != LicenseStatus::Active {
            return Err(SyncError::LicenseInactive(license.status));
        }
        if license.is_past_expiry(now) {
            return Err(SyncError::LicenseInactive(LicenseStatus::Expired));
        }

        repo.touch_device(license.id, &claims.fp)
            .await?
            .ok_or(SyncError::DeviceNotRegistered)?;

        Ok(Terminal {
            license_id: license.id,
            store_id: license.store_id,
            fingerprint_hash: claims.fp,
        })
    }

    /// Active products and every table of the terminal's store.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::StoreNotFound` if the store is gone.
    pub async fn catalog(&self, terminal: &Terminal) -> Result<CatalogSnapshot, SyncError> {
        let store = StoreRepository::new(self.pool)
            .get_by_id(terminal.store_id)
            .await?
            .ok_or(SyncError::StoreNotFound)?;
        let products = ProductRepository::new(self.pool)
            .list(store.id, false)
            .await?;
        let tables = TableRepository::new(self.pool).list(store.id).await?;

        Ok(CatalogSnapshot {
            store_id: store.id,
            currency: store.currency,
            tax_rate: store.tax_rate,
            products: products.iter().map(CatalogProduct::from).collect(),
            tables: tables.iter().map(CatalogTable::from).collect(),
        })
    }

    /// Upsert a batch of terminal orders.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::BatchTooLarge` past [`MAX_SYNC_BATCH`] orders and
    /// `SyncError::Repository` if the database fails mid-batch. Orders
    /// committed before the failure stay committed; pushes are idempotent.
    #[instrument(skip(self, request), fields(store_id = %terminal.store_id, orders = request.orders.len()))]
    pub async fn push_orders(
        &self,
        terminal: &Terminal,
        request: &SyncPushRequest,
    ) -> Result<SyncPushResponse, SyncError> {
        if request.orders.len() > MAX_SYNC_BATCH {
            return Err(SyncError::BatchTooLarge(request.orders.len()));
        }
        let store = StoreRepository::new(self.pool)
            .get_by_id(terminal.store_id)
            .await?
            .ok_or(SyncError::StoreNotFound)?;

        let mut response = SyncPushResponse::default();
        for order in &request.orders {
            match self.upsert_order(&store, order).await {
                Ok(()) => response.accepted.push(order.id),
                Err(PushFailure::Rejected(reason)) => {
                    tracing::warn!(order_id = %order.id, %reason, "rejected pushed order");
                    response.rejected.push(RejectedOrder {
                        id: order.id,
                        reason,
                    });
                }
                Err(PushFailure::Repository(e)) => return Err(e.into()),
            }
        }

        if !response.rejected.is_empty() {
            let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
            notifications::create(
                &mut conn,
                &NewNotification::store_wide(
                    store.id,
                    NotificationKind::SyncFailed,
                    "Terminal orders rejected",
                    format!(
                        "{} of {} pushed orders were rejected. First reason: {}",
                        response.rejected.len(),
                        request.orders.len(),
                        response.rejected.first().map_or("", |r| r.reason.as_str()),
                    ),
                ),
            )
            .await?;
        }

        tracing::info!(
            accepted = response.accepted.len(),
            rejected = response.rejected.len(),
            "terminal push processed"
        );
        Ok(response)
    }

    async fn upsert_order(&self, store: &Store, order: &SyncOrder) -> Result<(), PushFailure> {
        let totals = check_pushed_order(order, store.tax_rate).map_err(PushFailure::Rejected)?;

        let mut tx = self.pool.begin().await?;

        match orders::owner_store(&mut tx, order.id).await? {
            Some(owner) if owner != store.id => {
                return Err(PushFailure::Rejected(
                    "order id belongs to another store".to_string(),
                ));
            }
            _ => {}
        }
        let existing = orders::lock(&mut tx, store.id, order.id).await?;

        let ids: Vec<ProductId> = order.items.iter().map(|i| i.product_id).collect();
        let catalog: HashMap<ProductId, Product> = products::lock_many(&mut tx, store.id, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        if let Some(missing) = ids.iter().find(|id| !catalog.contains_key(id)) {
            return Err(PushFailure::Rejected(format!(
                "product {missing} does not belong to this store"
            )));
        }

        if let Some(table_id) = order.table_id {
            if tables::lock(&mut tx, store.id, table_id).await?.is_none() {
                return Err(PushFailure::Rejected(format!(
                    "table {table_id} does not belong to this store"
                )));
            }
        }

        let order_number = match &existing {
            Some(current) => current.order_number,
            None => orders::next_order_number(&mut tx, store.id).await?,
        };

        orders::upsert(
            &mut tx,
            &NewOrder {
                id: order.id,
                store_id: store.id,
                table_id: order.table_id,
                user_id: None,
                order_number,
                status: order.status,
                payment_method: order.payment_method,
                totals,
                notes: clean_note(order.notes.as_deref()).unwrap_or_default(),
                source: OrderSource::Offline,
                created_at: order.created_at,
                updated_at: order.updated_at,
                paid_at: paid_at_for(order),
            },
        )
        .await?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let line_total = item
                .line()
                .total()
                .map_err(|e| PushFailure::Rejected(e.to_string()))?;
            items.push(NewOrderItem {
                product_id: item.product_id,
                name: item.name.trim().to_string(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                line_total,
                notes: clean_note(item.notes.as_deref()).unwrap_or_default(),
            });
        }
        orders::replace_items(&mut tx, order.id, &items).await?;

        if existing.is_none() && order.status != OrderStatus::Cancelled {
            decrement_stock(&mut tx, store, order, &catalog).await?;
        }

        sync_tables(&mut tx, store.id, existing.as_ref().and_then(|o| o.table_id), order).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn decrement_stock(
    conn: &mut PgConnection,
    store: &Store,
    order: &SyncOrder,
    catalog: &HashMap<ProductId, Product>,
) -> Result<(), RepositoryError> {
    for item in &order.items {
        let Some(product) = catalog.get(&item.product_id) else {
            continue;
        };
        if product.track_inventory {
            apply_movement(
                conn,
                product,
                -item.quantity,
                reasons::SALE,
                None,
                store.low_stock_threshold,
            )
            .await?;
        }
    }
    Ok(())
}

/// Seat or release tables after a pushed order changed.
async fn sync_tables(
    conn: &mut PgConnection,
    store_id: StoreId,
    previous_table: Option<TableId>,
    order: &SyncOrder,
) -> Result<(), RepositoryError> {
    if let Some(previous) = previous_table.filter(|t| Some(*t) != order.table_id) {
        tables::release_if_idle(conn, store_id, previous).await?;
    }
    let Some(table_id) = order.table_id else {
        return Ok(());
    };
    if order.status.is_terminal() {
        tables::release_if_idle(conn, store_id, table_id).await?;
    } else {
        let table = tables::lock(conn, store_id, table_id).await?;
        if table.is_some_and(|t| t.status == TableStatus::Available) {
            tables::set_status(conn, store_id, table_id, TableStatus::Occupied).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use tableside_core::{OrderId, PaymentMethod};

    use super::*;

    fn order(items: Vec<SyncOrderItem>) -> SyncOrder {
        let now = Utc::now();
        SyncOrder {
            id: OrderId::generate(),
            table_id: None,
            status: OrderStatus::Open,
            payment_method: None,
            notes: None,
            items,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    fn item(price: &str, quantity: i32) -> SyncOrderItem {
        SyncOrderItem {
            product_id: ProductId::new(1),
            name: "Espresso".to_string(),
            unit_price: Decimal::from_str(price).unwrap(),
            quantity,
            notes: None,
        }
    }

    #[test]
    fn test_totals_recomputed_from_lines() {
        let pushed = order(vec![item("2.50", 2), item("1.25", 1)]);
        let totals = check_pushed_order(&pushed, Decimal::from_str("0.10").unwrap()).unwrap();
        assert_eq!(totals.subtotal, Decimal::from_str("6.25").unwrap());
        assert_eq!(totals.tax, Decimal::from_str("0.63").unwrap());
        assert_eq!(totals.total, Decimal::from_str("6.88").unwrap());
    }

    #[test]
    fn test_rejects_bad_lines() {
        assert!(check_pushed_order(&order(vec![]), Decimal::ZERO).is_err());
        assert!(check_pushed_order(&order(vec![item("1.00", 0)]), Decimal::ZERO).is_err());

        let mut unnamed = item("1.00", 1);
        unnamed.name = "  ".to_string();
        assert!(check_pushed_order(&order(vec![unnamed]), Decimal::ZERO).is_err());

        let mut noisy = order(vec![item("1.00", 1)]);
        noisy.notes = Some("x".repeat(MAX_NOTE_LEN + 1));
        assert!(check_pushed_order(&noisy, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_rejects_lines_that_cannot_be_stored() {
        let huge = order(vec![item("100.00", 1_000_000_000)]);
        let reason = check_pushed_order(&huge, Decimal::ZERO).unwrap_err();
        assert!(reason.contains("quantity must be at most"), "{reason}");

        let mut overflowing = item("1.00", 1);
        overflowing.unit_price = Decimal::MAX;
        assert!(check_pushed_order(&order(vec![overflowing]), Decimal::ZERO).is_err());

        assert!(check_pushed_order(&order(vec![item("0.125", 1)]), Decimal::ZERO).is_err());

        let too_much = order(vec![item("999999999.99", 10), item("0.10", 1)]);
        let reason = check_pushed_order(&too_much, Decimal::ZERO).unwrap_err();
        assert!(reason.contains("order total"), "{reason}");
    }

    #[test]
    fn test_database_errors_fail_the_push() {
        assert!(matches!(
            PushFailure::from(sqlx::Error::PoolTimedOut),
            PushFailure::Repository(_)
        ));
        assert!(matches!(
            PushFailure::from(RepositoryError::NotFound),
            PushFailure::Repository(_)
        ));
    }

    #[test]
    fn test_paid_at_defaults_to_updated_at() {
        let mut pushed = order(vec![item("1.00", 1)]);
        assert_eq!(paid_at_for(&pushed), None);

        pushed.status = OrderStatus::Paid;
        pushed.payment_method = Some(PaymentMethod::Cash);
        assert_eq!(paid_at_for(&pushed), Some(pushed.updated_at));

        let paid = pushed.updated_at - chrono::Duration::minutes(5);
        pushed.paid_at = Some(paid);
        assert_eq!(paid_at_for(&pushed), Some(paid));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SyncError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            SyncError::LicenseInactive(LicenseStatus::Suspended).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(SyncError::DeviceNotRegistered.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(SyncError::BatchTooLarge(501).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
