//! Inventory domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tableside_core::{InventoryMovementId, ProductId, StoreId, UserId};

/// Stock level of a tracked product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub product_id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub stock_quantity: i32,
    pub is_low_stock: bool,
}

/// A signed change to a product's stock with its reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: InventoryMovementId,
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub delta: i32,
    pub reason: String,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Movement reasons written by the system itself.
pub mod reasons {
    pub const SALE: &str = "sale";
    pub const CANCELLATION: &str = "cancellation";
}
