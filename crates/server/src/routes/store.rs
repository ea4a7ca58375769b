//! Store settings.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::db::stores::StoreRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireOwner};
use crate::models::store::{Store, UpdateStoreInput};
use crate::state::AppState;

/// Validate an owner's settings change.
///
/// # Errors
///
/// Returns `AppError::BadRequest` naming the first invalid field.
pub fn validate_update(input: &UpdateStoreInput) -> Result<(), AppError> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if let Some(currency) = input.currency.as_deref() {
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::BadRequest(
                "currency must be a three-letter ISO code".to_string(),
            ));
        }
    }
    if input
        .tax_rate
        .is_some_and(|rate| rate < Decimal::ZERO || rate > Decimal::ONE)
    {
        return Err(AppError::BadRequest(
            "tax_rate must be between 0 and 1".to_string(),
        ));
    }
    if input.low_stock_threshold.is_some_and(|t| t < 0) {
        return Err(AppError::BadRequest(
            "low_stock_threshold cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// The current user's store.
///
/// # Errors
///
/// Returns 404 if the store no longer exists.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Store>, AppError> {
    let store_id = user.store_scope()?;
    StoreRepository::new(state.pool())
        .get_by_id(store_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Store not found".to_string()))
}

/// Update store settings.
///
/// # Errors
///
/// Returns 400 for invalid settings.
#[instrument(skip(state, user, body))]
pub async fn update(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Json(mut body): Json<UpdateStoreInput>,
) -> Result<Json<Store>, AppError> {
    let store_id = user.store_scope()?;
    body.currency = body.currency.map(|c| c.trim().to_ascii_uppercase());
    validate_update(&body)?;

    let store = StoreRepository::new(state.pool())
        .update(store_id, &body)
        .await?;
    tracing::info!(%store_id, "store settings updated");
    Ok(Json(store))
}
