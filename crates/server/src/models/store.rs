//! Store (tenant) domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tableside_core::StoreId;

/// A restaurant or café using the POS. Every other entity hangs off a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    /// URL-safe unique handle, also used for backup directory names.
    pub slug: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Sales tax as a fraction (0.08 = 8%).
    pub tax_rate: Decimal,
    /// Tracked stock at or below this level raises a `low_stock` notification.
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner-editable store settings. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStoreInput {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub low_stock_threshold: Option<i32>,
}

/// Normalize a store slug: lower-case ASCII letters, digits and dashes.
///
/// Returns `None` when nothing usable is left.
#[must_use]
pub fn normalize_slug(raw: &str) -> Option<String> {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if (c == '-' || c == ' ' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    (!slug.is_empty()).then_some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("Blue Door Café"), Some("blue-door-caf".to_string()));
        assert_eq!(normalize_slug("  corner__bistro "), Some("corner-bistro".to_string()));
        assert_eq!(normalize_slug("---"), None);
    }
}
