//! Terminal sync endpoints, authenticated by license token.

use axum::{Json, extract::State};

use tableside_core::{CatalogSnapshot, SyncPushRequest, SyncPushResponse};

use crate::error::AppError;
use crate::middleware::RequireTerminal;
use crate::services::SyncService;
use crate::state::AppState;

/// `GET /api/sync/catalog`.
///
/// # Errors
///
/// Returns 404 if the terminal's store no longer exists.
pub async fn catalog(
    RequireTerminal(terminal): RequireTerminal,
    State(state): State<AppState>,
) -> Result<Json<CatalogSnapshot>, AppError> {
    let snapshot = SyncService::new(state.pool(), state.signer())
        .catalog(&terminal)
        .await?;
    Ok(Json(snapshot))
}

/// `POST /api/sync/orders`.
///
/// # Errors
///
/// Returns 413 for an oversized batch. Individual bad orders are reported in
/// the response's `rejected` list.
pub async fn push_orders(
    RequireTerminal(terminal): RequireTerminal,
    State(state): State<AppState>,
    Json(body): Json<SyncPushRequest>,
) -> Result<Json<SyncPushResponse>, AppError> {
    let response = SyncService::new(state.pool(), state.signer())
        .push_orders(&terminal, &body)
        .await?;
    Ok(Json(response))
}
