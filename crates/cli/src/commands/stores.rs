//! Store provisioning.

use rust_decimal::Decimal;

use tableside_server::db::StoreRepository;
use tableside_server::models::store::{UpdateStoreInput, normalize_slug};
use tableside_server::routes::store::validate_update;

use super::{CommandError, connect, print_json};

/// Create a store. The slug is derived from the name unless given.
pub async fn create(
    name: &str,
    slug: Option<&str>,
    currency: &str,
    tax_rate: Decimal,
) -> Result<(), Box<dyn std::error::Error>> {
    let currency = currency.trim().to_ascii_uppercase();
    validate_update(&UpdateStoreInput {
        name: Some(name.to_string()),
        currency: Some(currency.clone()),
        tax_rate: Some(tax_rate),
        low_stock_threshold: None,
    })?;

    let slug = normalize_slug(slug.unwrap_or(name))
        .ok_or_else(|| CommandError::InvalidArgument("slug has no usable characters".to_string()))?;

    let pool = connect().await?;
    let store = StoreRepository::new(&pool)
        .create(name.trim(), &slug, &currency, tax_rate)
        .await?;

    tracing::info!(store_id = %store.id, slug = %store.slug, "Store created");
    print_json(&store)?;
    Ok(())
}
