//! Floor plan: dining tables.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use tableside_core::{TableId, TableStatus};

use crate::db::tables::TableRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireManager};
use crate::models::table::{CreateTableInput, DiningTable, UpdateTableInput};
use crate::state::AppState;

/// Most seats a single table may have.
const MAX_SEATS: i32 = 100;

/// Body of `PATCH /api/tables/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TableStatus,
}

fn check_label(label: &str) -> Result<(), AppError> {
    let label = label.trim();
    if label.is_empty() || label.chars().count() > 50 {
        return Err(AppError::BadRequest(
            "label must be 1-50 characters".to_string(),
        ));
    }
    Ok(())
}

fn check_seats(seats: i32) -> Result<(), AppError> {
    if !(1..=MAX_SEATS).contains(&seats) {
        return Err(AppError::BadRequest(format!(
            "seats must be between 1 and {MAX_SEATS}"
        )));
    }
    Ok(())
}

/// List the store's tables.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<DiningTable>>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(TableRepository::new(state.pool()).list(store_id).await?))
}

/// Add a table.
///
/// # Errors
///
/// Returns 409 if the label is taken.
#[instrument(skip(state, user, body))]
pub async fn create(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Json(mut body): Json<CreateTableInput>,
) -> Result<(StatusCode, Json<DiningTable>), AppError> {
    let store_id = user.store_scope()?;
    check_label(&body.label)?;
    check_seats(body.seats)?;
    body.label = body.label.trim().to_string();

    let table = TableRepository::new(state.pool())
        .create(store_id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(table)))
}

/// Rename or resize a table.
///
/// # Errors
///
/// Returns 404 if the table is not in the store and 409 if the label is taken.
#[instrument(skip(state, user, body))]
pub async fn update(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<TableId>,
    Json(mut body): Json<UpdateTableInput>,
) -> Result<Json<DiningTable>, AppError> {
    let store_id = user.store_scope()?;
    if let Some(label) = body.label.as_deref() {
        check_label(label)?;
    }
    if let Some(seats) = body.seats {
        check_seats(seats)?;
    }
    body.label = body.label.map(|l| l.trim().to_string());

    Ok(Json(
        TableRepository::new(state.pool())
            .update(store_id, id, &body)
            .await?,
    ))
}

/// Set a table's status by hand (e.g. reserve it, or take it out of service).
///
/// # Errors
///
/// Returns 404 if the table is not in the store.
#[instrument(skip(state, user))]
pub async fn set_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TableId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<DiningTable>, AppError> {
    let store_id = user.store_scope()?;
    if body.status == TableStatus::OutOfService && !user.role.can_manage() {
        return Err(AppError::Forbidden(
            "only managers can take tables out of service".to_string(),
        ));
    }

    Ok(Json(
        TableRepository::new(state.pool())
            .set_status(store_id, id, body.status)
            .await?,
    ))
}

/// Remove a table. Refused while orders are open at it.
///
/// # Errors
///
/// Returns 409 if the table has open orders.
#[instrument(skip(state, user))]
pub async fn delete(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<TableId>,
) -> Result<StatusCode, AppError> {
    let store_id = user.store_scope()?;
    TableRepository::new(state.pool()).delete(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
