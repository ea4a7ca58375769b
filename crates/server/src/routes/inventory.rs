//! Stock levels, adjustments and movement history.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use tableside_core::ProductId;

use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireManager};
use crate::models::inventory::{InventoryItem, InventoryMovement};
use crate::services::InventoryService;
use crate::state::AppState;

/// Body of `POST /api/inventory/{product_id}/adjust`.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i32,
    pub reason: String,
}

/// Query of `GET /api/inventory/{product_id}/movements`.
#[derive(Debug, Default, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<i64>,
}

/// Stock of tracked products with their low-stock flag.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryItem>>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(InventoryService::new(state.pool()).list(store_id).await?))
}

/// Adjust a product's stock.
///
/// # Errors
///
/// Returns 400 if the result would be negative.
pub async fn adjust(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<InventoryItem>, AppError> {
    let store_id = user.store_scope()?;
    let item = InventoryService::new(state.pool())
        .adjust(store_id, product_id, body.delta, &body.reason, user.id)
        .await?;
    Ok(Json(item))
}

/// Movement history of a product, newest first.
///
/// # Errors
///
/// Returns 404 if the product is not in the store.
pub async fn movements(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Query(query): Query<MovementsQuery>,
) -> Result<Json<Vec<InventoryMovement>>, AppError> {
    let store_id = user.store_scope()?;
    let movements = InventoryService::new(state.pool())
        .movements(store_id, product_id, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(movements))
}
