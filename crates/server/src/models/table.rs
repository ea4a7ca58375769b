//! Dining table domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tableside_core::{CatalogTable, StoreId, TableId, TableStatus};

/// A table on the floor plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: TableId,
    pub store_id: StoreId,
    /// Unique within the store (e.g. "T4", "Patio 2").
    pub label: String,
    pub seats: i32,
    pub status: TableStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&DiningTable> for CatalogTable {
    fn from(t: &DiningTable) -> Self {
        Self {
            id: t.id,
            label: t.label.clone(),
            seats: t.seats,
            status: t.status,
        }
    }
}

/// Body of `POST /api/tables`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTableInput {
    pub label: String,
    pub seats: i32,
}

/// Body of `PUT /api/tables/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTableInput {
    pub label: Option<String>,
    pub seats: Option<i32>,
}
