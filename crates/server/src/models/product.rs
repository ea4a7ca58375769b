//! Catalog product domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tableside_core::{CatalogProduct, ProductId, StoreId};

/// A sellable menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    /// When set, sales decrement `stock_quantity`.
    pub track_inventory: bool,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for CatalogProduct {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            sku: p.sku.clone(),
            category: p.category.clone(),
            price: p.price,
        }
    }
}

/// Body of `POST /api/products`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub track_inventory: bool,
    #[serde(default)]
    pub stock_quantity: i32,
}

/// Body of `PUT /api/products/{id}`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub track_inventory: Option<bool>,
    pub is_active: Option<bool>,
}
