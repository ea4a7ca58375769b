//! The user's notification inbox.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Value, json};

use tableside_core::NotificationId;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::notification::Notification;
use crate::services::NotificationService;
use crate::services::notifications::{InboxQuery, UnreadCount};
use crate::state::AppState;

/// Store-wide notifications plus the user's own, newest first.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(
        NotificationService::new(state.pool())
            .inbox(store_id, user.id, &query)
            .await?,
    ))
}

/// Number of unread notifications.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn unread_count(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<UnreadCount>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(
        NotificationService::new(state.pool())
            .unread_count(store_id, user.id)
            .await?,
    ))
}

/// Mark one notification read.
///
/// # Errors
///
/// Returns 404 if it is not in the user's inbox.
pub async fn mark_read(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<Value>, AppError> {
    let store_id = user.store_scope()?;
    NotificationService::new(state.pool())
        .mark_read(store_id, user.id, id)
        .await?;
    Ok(Json(json!({ "read": true })))
}

/// Mark the whole inbox read.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn mark_all_read(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let store_id = user.store_scope()?;
    let updated = NotificationService::new(state.pool())
        .mark_all_read(store_id, user.id)
        .await?;
    Ok(Json(json!({ "updated": updated })))
}
