//! Counter orders: creation and status changes.
//!
//! Creation prices lines from the catalog, reserves the next order number,
//! seats the table and decrements tracked stock in one transaction.

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use tableside_core::{
    MoneyError, OrderId, OrderLine, OrderSource, OrderStatus, OrderTotals, PaymentMethod,
    ProductId, StoreId, TableId, TableStatus, UserId,
};

use crate::db::RepositoryError;
use crate::db::orders::{self, NewOrder, NewOrderItem, OrderRepository};
use crate::db::products;
use crate::db::stores::StoreRepository;
use crate::db::tables;
use crate::models::inventory::reasons;
use crate::models::order::{CreateOrderInput, Order, OrderFilter, OrderWithItems};
use crate::models::product::Product;
use crate::services::inventory::apply_movement;

/// Longest accepted order or line note.
pub const MAX_NOTE_LEN: usize = 500;

/// Errors that can occur while working with orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("store not found")]
    StoreNotFound,

    #[error("{0}")]
    InvalidLines(#[from] MoneyError),

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("table not found")]
    TableNotFound,

    #[error("table {0} is out of service")]
    TableOutOfService(TableId),

    #[error("order is already {0}")]
    AlreadyClosed(OrderStatus),

    #[error("a payment method is required to mark an order paid")]
    PaymentMethodRequired,

    #[error("note must be at most {MAX_NOTE_LEN} characters")]
    NoteTooLong,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl OrderError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound
            | Self::StoreNotFound
            | Self::TableNotFound
            | Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::InvalidLines(_)
            | Self::ProductUnavailable(_)
            | Self::TableOutOfService(_)
            | Self::PaymentMethodRequired
            | Self::NoteTooLong => StatusCode::BAD_REQUEST,
            Self::AlreadyClosed(_) | Self::Repository(RepositoryError::Conflict(_)) => {
                StatusCode::CONFLICT
            }
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Check a status change against the order's current state.
///
/// Terminal orders never change; `paid` needs a payment method.
///
/// # Errors
///
/// Returns `OrderError::AlreadyClosed` or `OrderError::PaymentMethodRequired`.
pub fn check_transition(
    current: OrderStatus,
    next: OrderStatus,
    payment_method: Option<PaymentMethod>,
) -> Result<(), OrderError> {
    if current.is_terminal() {
        return Err(OrderError::AlreadyClosed(current));
    }
    if next == OrderStatus::Paid && payment_method.is_none() {
        return Err(OrderError::PaymentMethodRequired);
    }
    Ok(())
}

/// Trim a note, dropping empty ones.
///
/// # Errors
///
/// Returns `OrderError::NoteTooLong` past [`MAX_NOTE_LEN`].
pub fn clean_note(note: Option<&str>) -> Result<Option<String>, OrderError> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(OrderError::NoteTooLong);
    }
    Ok(Some(note.to_string()))
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders of a store, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list(&self, store_id: StoreId, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        Ok(OrderRepository::new(self.pool).list(store_id, filter).await?)
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not in the store.
    pub async fn get(&self, store_id: StoreId, id: OrderId) -> Result<OrderWithItems, OrderError> {
        OrderRepository::new(self.pool)
            .get_with_items(store_id, id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Create a counter order priced from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `OrderError` if a product or the table is unusable or the lines
    /// are invalid.
    #[instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn create(
        &self,
        store_id: StoreId,
        user_id: UserId,
        input: &CreateOrderInput,
    ) -> Result<OrderWithItems, OrderError> {
        let notes = clean_note(input.notes.as_deref())?;
        let store = StoreRepository::new(self.pool)
            .get_by_id(store_id)
            .await?
            .ok_or(OrderError::StoreNotFound)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let ids: Vec<ProductId> = input.items.iter().map(|i| i.product_id).collect();
        let catalog: HashMap<ProductId, Product> = products::lock_many(&mut tx, store_id, &ids)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(input.items.len());
        let mut new_items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = catalog
                .get(&item.product_id)
                .ok_or(OrderError::ProductUnavailable(item.product_id))?;
            let line = OrderLine::new(product.price, item.quantity);
            lines.push(line);
            new_items.push(NewOrderItem {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity: item.quantity,
                line_total: line.total()?,
                notes: clean_note(item.notes.as_deref())?,
            });
        }
        let totals = OrderTotals::compute(&lines, store.tax_rate)?;

        if let Some(table_id) = input.table_id {
            let table = tables::lock(&mut tx, store_id, table_id)
                .await?
                .ok_or(OrderError::TableNotFound)?;
            if table.status == TableStatus::OutOfService {
                return Err(OrderError::TableOutOfService(table_id));
            }
            tables::set_status(&mut tx, store_id, table_id, TableStatus::Occupied).await?;
        }

        let order_number = orders::next_order_number(&mut tx, store_id).await?;
        let now = Utc::now();
        let order = orders::upsert(
            &mut tx,
            &NewOrder {
                id: OrderId::generate(),
                store_id,
                table_id: input.table_id,
                user_id: Some(user_id),
                order_number,
                status: OrderStatus::Open,
                payment_method: None,
                totals,
                notes,
                source: OrderSource::Counter,
                created_at: now,
                updated_at: now,
                paid_at: None,
            },
        )
        .await?;
        let items = orders::replace_items(&mut tx, order.id, &new_items).await?;

        for item in &input.items {
            let Some(product) = catalog.get(&item.product_id) else {
                continue;
            };
            if product.track_inventory {
                apply_movement(
                    &mut tx,
                    product,
                    -item.quantity,
                    reasons::SALE,
                    Some(user_id),
                    store.low_stock_threshold,
                )
                .await?;
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        tracing::info!(order_id = %order.id, order_number, total = %order.total, "order created");

        Ok(OrderWithItems { order, items })
    }

    /// Move an order to another status.
    ///
    /// Cancelling restocks tracked lines. Closing the last open order at a
    /// table frees the table.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::AlreadyClosed` for paid or cancelled orders and
    /// `OrderError::PaymentMethodRequired` when paying without a method.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        store_id: StoreId,
        user_id: UserId,
        id: OrderId,
        status: OrderStatus,
        payment_method: Option<PaymentMethod>,
    ) -> Result<OrderWithItems, OrderError> {
        let store = StoreRepository::new(self.pool)
            .get_by_id(store_id)
            .await?
            .ok_or(OrderError::StoreNotFound)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let current = orders::lock(&mut tx, store_id, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        check_transition(current.status, status, payment_method)?;

        let (payment_method, paid_at) = if status == OrderStatus::Paid {
            (payment_method, Some(Utc::now()))
        } else {
            (None, None)
        };
        orders::set_status(&mut tx, store_id, id, status, payment_method, paid_at).await?;

        if status == OrderStatus::Cancelled {
            let lines = orders::get_with_items(&mut tx, store_id, id)
                .await?
                .map(|o| o.items)
                .unwrap_or_default();
            let ids: Vec<ProductId> = lines.iter().filter_map(|i| i.product_id).collect();
            let catalog: HashMap<ProductId, Product> = products::lock_many(&mut tx, store_id, &ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect();
            for line in &lines {
                let Some(product) = line.product_id.and_then(|pid| catalog.get(&pid)) else {
                    continue;
                };
                if product.track_inventory {
                    apply_movement(
                        &mut tx,
                        product,
                        line.quantity,
                        reasons::CANCELLATION,
                        Some(user_id),
                        store.low_stock_threshold,
                    )
                    .await?;
                }
            }
        }

        if status.is_terminal() {
            if let Some(table_id) = current.table_id {
                tables::release_if_idle(&mut tx, store_id, table_id).await?;
            }
        }

        let updated = orders::get_with_items(&mut tx, store_id, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(order_id = %id, from = %current.status, to = %status, "order status changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_orders_cannot_change() {
        for current in [OrderStatus::Paid, OrderStatus::Cancelled] {
            assert!(matches!(
                check_transition(current, OrderStatus::Open, None),
                Err(OrderError::AlreadyClosed(_))
            ));
        }
    }

    #[test]
    fn test_paid_requires_payment_method() {
        assert!(matches!(
            check_transition(OrderStatus::Served, OrderStatus::Paid, None),
            Err(OrderError::PaymentMethodRequired)
        ));
        assert!(check_transition(OrderStatus::Served, OrderStatus::Paid, Some(PaymentMethod::Card)).is_ok());
    }

    #[test]
    fn test_open_orders_move_freely() {
        assert!(check_transition(OrderStatus::Open, OrderStatus::Preparing, None).is_ok());
        assert!(check_transition(OrderStatus::Preparing, OrderStatus::Cancelled, None).is_ok());
    }

    #[test]
    fn test_clean_note() {
        assert_eq!(clean_note(None).ok(), Some(None));
        assert_eq!(clean_note(Some("   ")).ok(), Some(None));
        assert_eq!(clean_note(Some(" no ice ")).ok(), Some(Some("no ice".to_string())));
        assert!(matches!(
            clean_note(Some(&"x".repeat(MAX_NOTE_LEN + 1))),
            Err(OrderError::NoteTooLong)
        ));
    }

    #[test]
    fn test_oversized_counter_lines_are_bad_requests() {
        let line = OrderLine::new(rust_decimal::Decimal::new(250, 2), 50_000);
        let err = OrderError::from(OrderTotals::compute(&[line], rust_decimal::Decimal::ZERO).unwrap_err());
        assert!(matches!(err, OrderError::InvalidLines(MoneyError::QuantityTooLarge { .. })));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(OrderError::AlreadyClosed(OrderStatus::Paid).status_code(), StatusCode::CONFLICT);
        assert_eq!(OrderError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(OrderError::InvalidLines(MoneyError::Empty).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(OrderError::InvalidLines(MoneyError::Overflow).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            OrderError::ProductUnavailable(ProductId::new(4)).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
