//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tableside_core::{
    OrderId, OrderItemId, OrderSource, OrderStatus, PaymentMethod, ProductId, StoreId, TableId,
    UserId,
};

/// An order header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub table_id: Option<TableId>,
    pub user_id: Option<UserId>,
    /// Sequential per store, printed on tickets.
    pub order_number: i32,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub source: OrderSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A line of an order. `name` and `unit_price` are snapshots taken at sale time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub notes: Option<String>,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A requested line of a counter order. The price comes from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderItemInput {
    pub product_id: ProductId,
    pub quantity: i32,
    pub notes: Option<String>,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderInput {
    pub table_id: Option<TableId>,
    pub items: Vec<CreateOrderItemInput>,
    pub notes: Option<String>,
}

/// Body of `PATCH /api/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
}

/// Query filter for listing orders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub table_id: Option<TableId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderFilter {
    /// Maximum page size.
    pub const MAX_LIMIT: i64 = 200;
    /// Page size when none is requested.
    pub const DEFAULT_LIMIT: i64 = 50;

    /// Effective page size, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit_clamps() {
        let mut filter = OrderFilter::default();
        assert_eq!(filter.effective_limit(), 50);
        filter.limit = Some(10_000);
        assert_eq!(filter.effective_limit(), 200);
        filter.limit = Some(0);
        assert_eq!(filter.effective_limit(), 1);
    }
}
