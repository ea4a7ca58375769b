//! Per-store settings.
//!
//! Free-form JSON values keyed by name, used for things the schema does not
//! model (receipt footer, printer layout, ...).

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use tableside_core::StoreId;

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Get a store setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn get_setting(
    pool: &PgPool,
    store_id: StoreId,
    key: &str,
) -> Result<Option<JsonValue>, SettingsError> {
    let result = sqlx::query_scalar::<_, JsonValue>(
        "SELECT value FROM pos.setting WHERE key = $1 AND store_id = $2",
    )
    .bind(key)
    .bind(store_id)
    .fetch_optional(pool)
    .await?;

    Ok(result)
}

/// Set a store setting value.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn set_setting(
    pool: &PgPool,
    store_id: StoreId,
    key: &str,
    value: &JsonValue,
) -> Result<(), SettingsError> {
    sqlx::query(
        r"
        INSERT INTO pos.setting (key, store_id, value)
        VALUES ($1, $2, $3)
        ON CONFLICT (key, store_id) DO UPDATE SET value = $3, updated_at = NOW()
        ",
    )
    .bind(key)
    .bind(store_id)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a store setting.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn delete_setting(pool: &PgPool, store_id: StoreId, key: &str) -> Result<(), SettingsError> {
    sqlx::query("DELETE FROM pos.setting WHERE key = $1 AND store_id = $2")
        .bind(key)
        .bind(store_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Every setting of a store as `(key, value)` pairs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn list_settings(
    pool: &PgPool,
    store_id: StoreId,
) -> Result<Vec<(String, JsonValue)>, SettingsError> {
    let rows = sqlx::query_as::<_, (String, JsonValue)>(
        "SELECT key, value FROM pos.setting WHERE store_id = $1 ORDER BY key",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
