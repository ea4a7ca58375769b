//! Backup download and history.

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::RequireOwner;
use crate::models::Backup;
use crate::services::BackupService;
use crate::state::AppState;

/// Query of `GET /api/backups`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// `GET /api/backup/download`: the full store snapshot as a JSON attachment.
///
/// # Errors
///
/// Returns 500 if the snapshot cannot be built.
pub async fn download(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let store_id = user.store_scope()?;
    let (file_name, body) = BackupService::new(state.pool()).download(store_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

/// `GET /api/backups`: recent backup records, newest first.
///
/// # Errors
///
/// Returns 403 for owners without a store.
pub async fn list(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Backup>>, AppError> {
    let store_id = user.store_scope()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    Ok(Json(BackupService::new(state.pool()).list(store_id, limit).await?))
}
