//! Wire types shared by the server's terminal endpoints and the offline client.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{LicenseId, OrderId, ProductId, StoreId, TableId};
use super::money::OrderLine;
use super::status::{LicensePlan, OrderStatus, PaymentMethod, TableStatus};

/// Maximum number of orders accepted in one push.
pub const MAX_SYNC_BATCH: usize = 500;

/// A line item as recorded on the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOrderItem {
    pub product_id: ProductId,
    /// Product name at the time of sale.
    pub name: String,
    /// Catalog price the terminal charged.
    pub unit_price: Decimal,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SyncOrderItem {
    /// The priced line used for totals.
    #[must_use]
    pub const fn line(&self) -> OrderLine {
        OrderLine::new(self.unit_price, self.quantity)
    }
}

/// An order recorded on a terminal, pushed for upsert by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOrder {
    pub id: OrderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<TableId>,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub items: Vec<SyncOrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/sync/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPushRequest {
    pub orders: Vec<SyncOrder>,
}

/// An order the server refused, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub id: OrderId,
    pub reason: String,
}

/// Response of `POST /api/sync/orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPushResponse {
    pub accepted: Vec<OrderId>,
    pub rejected: Vec<RejectedOrder>,
}

/// A sellable product as cached by terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price: Decimal,
}

/// A dining table as cached by terminals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub id: TableId,
    pub label: String,
    pub seats: i32,
    pub status: TableStatus,
}

/// Response of `GET /api/sync/catalog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub store_id: StoreId,
    pub currency: String,
    pub tax_rate: Decimal,
    pub products: Vec<CatalogProduct>,
    pub tables: Vec<CatalogTable>,
}

/// Body of `POST /api/license/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseValidationRequest {
    pub key: String,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// License facts returned alongside a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub license_id: LicenseId,
    pub store_id: StoreId,
    pub plan: LicensePlan,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_devices: i32,
    pub active_devices: i64,
}

/// Response of `POST /api/license/validate`.
///
/// `reason` is a stable machine-readable code such as `expired` or
/// `device_limit_reached` when `valid` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseValidationResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseSummary>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_order_omits_empty_optionals() {
        let now = Utc::now();
        let order = SyncOrder {
            id: OrderId::generate(),
            table_id: None,
            status: OrderStatus::Open,
            payment_method: None,
            notes: None,
            items: vec![],
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("table_id").is_none());
        assert!(json.get("paid_at").is_none());
        assert_eq!(json["status"], "open");
    }

    #[test]
    fn test_prices_travel_as_strings() {
        let item = SyncOrderItem {
            product_id: ProductId::new(3),
            name: "Flat white".to_owned(),
            unit_price: Decimal::new(450, 2),
            quantity: 2,
            notes: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["unit_price"], "4.50");
    }
}
