//! Free-form per-store settings (receipt footer, printer layout, ...).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Map, Value};

use crate::db::settings::{self, SettingsError};
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireOwner};
use crate::state::AppState;

/// Longest accepted setting key.
const MAX_KEY_LEN: usize = 64;

fn check_key(key: &str) -> Result<(), AppError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if !valid {
        return Err(AppError::BadRequest(format!(
            "setting keys are 1-{MAX_KEY_LEN} characters of a-z, 0-9, '_' or '.'"
        )));
    }
    Ok(())
}

fn settings_error(err: SettingsError) -> AppError {
    AppError::Internal(err.to_string())
}

/// `GET /api/settings`: every setting as one JSON object.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Map<String, Value>>, AppError> {
    let store_id = user.store_scope()?;
    let rows = settings::list_settings(state.pool(), store_id)
        .await
        .map_err(settings_error)?;
    Ok(Json(rows.into_iter().collect()))
}

/// `GET /api/settings/{key}`.
///
/// # Errors
///
/// Returns 404 if the key is not set.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    let store_id = user.store_scope()?;
    check_key(&key)?;
    settings::get_setting(state.pool(), store_id, &key)
        .await
        .map_err(settings_error)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("setting {key}")))
}

/// `PUT /api/settings/{key}`.
///
/// # Errors
///
/// Returns 400 for a malformed key.
pub async fn put(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let store_id = user.store_scope()?;
    check_key(&key)?;
    settings::set_setting(state.pool(), store_id, &key, &value)
        .await
        .map_err(settings_error)?;
    Ok(Json(value))
}

/// `DELETE /api/settings/{key}`.
///
/// # Errors
///
/// Returns 400 for a malformed key.
pub async fn delete(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    let store_id = user.store_scope()?;
    check_key(&key)?;
    settings::delete_setting(state.pool(), store_id, &key)
        .await
        .map_err(settings_error)?;
    Ok(StatusCode::NO_CONTENT)
}
