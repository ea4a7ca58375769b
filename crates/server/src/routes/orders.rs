//! Counter orders.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use tableside_core::OrderId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::order::{
    CreateOrderInput, Order, OrderFilter, OrderWithItems, UpdateOrderStatusInput,
};
use crate::services::OrderService;
use crate::state::AppState;

/// List orders, newest first.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(OrderService::new(state.pool()).list(store_id, &filter).await?))
}

/// Get an order with its lines.
///
/// # Errors
///
/// Returns 404 if the order is not in the store.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(OrderService::new(state.pool()).get(store_id, id).await?))
}

/// Ring up a new order.
///
/// # Errors
///
/// Returns 400 for unknown products, bad quantities or an unusable table.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<OrderWithItems>), AppError> {
    let store_id = user.store_scope()?;
    let order = OrderService::new(state.pool())
        .create(store_id, user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Move an order along (preparing, served, paid, cancelled).
///
/// # Errors
///
/// Returns 409 for paid or cancelled orders.
pub async fn update_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateOrderStatusInput>,
) -> Result<Json<OrderWithItems>, AppError> {
    let store_id = user.store_scope()?;
    let order = OrderService::new(state.pool())
        .update_status(store_id, user.id, id, body.status, body.payment_method)
        .await?;
    Ok(Json(order))
}
