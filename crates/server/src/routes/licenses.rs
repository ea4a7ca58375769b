//! License validation for terminals and license administration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use tableside_core::{
    LicenseDeviceId, LicenseId, LicenseStatus, LicenseValidationRequest, LicenseValidationResponse,
    UserRole,
};

use crate::db::{LicenseRepository, StoreRepository};
use crate::error::AppError;
use crate::middleware::{RequireOwner, RequireSuperAdmin};
use crate::models::CurrentUser;
use crate::models::license::{IssueLicenseInput, License, LicenseDevice};
use crate::services::LicenseService;
use crate::state::AppState;

/// `POST /api/license/validate`.
///
/// Refusals are answered with `{ "valid": false, "reason": "<code>" }` and
/// the matching status so terminals can tell a revoked key from a typo.
///
/// # Errors
///
/// Returns `AppError` only for server-side failures.
pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<LicenseValidationRequest>,
) -> Result<Response, AppError> {
    let service = LicenseService::new(state.pool(), state.signer());
    match service.validate(&body, Utc::now()).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(e) if e.status_code().is_server_error() => Err(e.into()),
        Err(e) => {
            tracing::info!(reason = e.code(), "license validation refused");
            let response = LicenseValidationResponse {
                valid: false,
                reason: Some(e.code().to_string()),
                token: None,
                license: None,
            };
            Ok((e.status_code(), Json(response)).into_response())
        }
    }
}

/// Load a license the user may see: any for super admins, the own store's
/// for owners. Other stores' licenses are reported as missing.
async fn visible_license(
    state: &AppState,
    user: &CurrentUser,
    id: LicenseId,
) -> Result<License, AppError> {
    let license = LicenseRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("license".to_string()))?;

    if user.role != UserRole::SuperAdmin && Some(license.store_id) != user.store_id {
        return Err(AppError::NotFound("license".to_string()));
    }
    Ok(license)
}

/// `GET /api/licenses`: every license for super admins, the store's own
/// for owners.
///
/// # Errors
///
/// Returns 403 for owners without a store.
pub async fn list(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
) -> Result<Json<Vec<License>>, AppError> {
    let scope = if user.role == UserRole::SuperAdmin {
        None
    } else {
        Some(user.store_scope()?)
    };
    Ok(Json(LicenseRepository::new(state.pool()).list(scope).await?))
}

/// `POST /api/licenses`: issue a new key.
///
/// # Errors
///
/// Returns 400 for a bad device cap or expiry and 404 for an unknown store.
pub async fn issue(
    RequireSuperAdmin(_user): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(body): Json<IssueLicenseInput>,
) -> Result<(StatusCode, Json<License>), AppError> {
    StoreRepository::new(state.pool())
        .get_by_id(body.store_id)
        .await?
        .ok_or_else(|| AppError::NotFound("store".to_string()))?;

    let license = LicenseService::new(state.pool(), state.signer())
        .issue(body.store_id, body.plan, body.max_devices, body.expires_at)
        .await?;
    Ok((StatusCode::CREATED, Json(license)))
}

/// `GET /api/licenses/{id}/devices`.
///
/// # Errors
///
/// Returns 404 if the license is not visible to the user.
pub async fn devices(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Path(id): Path<LicenseId>,
) -> Result<Json<Vec<LicenseDevice>>, AppError> {
    let license = visible_license(&state, &user, id).await?;
    Ok(Json(
        LicenseRepository::new(state.pool())
            .devices(license.id)
            .await?,
    ))
}

async fn transition(
    state: &AppState,
    id: LicenseId,
    to: LicenseStatus,
) -> Result<Json<License>, AppError> {
    let license = LicenseService::new(state.pool(), state.signer())
        .transition(id, to)
        .await?;
    Ok(Json(license))
}

/// `POST /api/licenses/{id}/suspend`.
///
/// # Errors
///
/// Returns 409 unless the license is active.
pub async fn suspend(
    RequireSuperAdmin(_user): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<LicenseId>,
) -> Result<Json<License>, AppError> {
    transition(&state, id, LicenseStatus::Suspended).await
}

/// `POST /api/licenses/{id}/reactivate`.
///
/// # Errors
///
/// Returns 409 unless the license is suspended and not past its expiry.
pub async fn reactivate(
    RequireSuperAdmin(_user): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<LicenseId>,
) -> Result<Json<License>, AppError> {
    transition(&state, id, LicenseStatus::Active).await
}

/// `POST /api/licenses/{id}/revoke`.
///
/// # Errors
///
/// Returns 409 if the license is already revoked.
pub async fn revoke(
    RequireSuperAdmin(_user): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<LicenseId>,
) -> Result<Json<License>, AppError> {
    transition(&state, id, LicenseStatus::Revoked).await
}

/// `DELETE /api/licenses/{id}/devices/{device_id}`: free a device slot.
///
/// # Errors
///
/// Returns 404 if the license or device is not visible to the user.
pub async fn remove_device(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Path((id, device_id)): Path<(LicenseId, LicenseDeviceId)>,
) -> Result<StatusCode, AppError> {
    let license = visible_license(&state, &user, id).await?;
    LicenseRepository::new(state.pool())
        .remove_device(license.id, device_id)
        .await?;
    tracing::info!(license_id = %license.id, device_id = %device_id, "removed license device");
    Ok(StatusCode::NO_CONTENT)
}
