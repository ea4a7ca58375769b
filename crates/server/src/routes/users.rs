//! Staff management for store owners.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use tableside_core::{UserId, UserRole};

use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::middleware::RequireOwner;
use crate::models::user::{CreateUserInput, UpdateUserInput, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Owners manage staff of their store; platform roles are issued elsewhere.
fn check_assignable(role: UserRole) -> Result<(), AppError> {
    if role == UserRole::SuperAdmin {
        return Err(AppError::Forbidden(
            "super admins cannot be created from a store".to_string(),
        ));
    }
    Ok(())
}

/// Staff of the owner's store.
///
/// # Errors
///
/// Returns 403 for users without a store.
pub async fn list(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    let store_id = user.store_scope()?;
    Ok(Json(UserRepository::new(state.pool()).list_for_store(store_id).await?))
}

/// Create a staff account.
///
/// # Errors
///
/// Returns 400 for a bad email or weak password and 409 for a taken email.
#[instrument(skip(state, user, body), fields(role = %body.role))]
pub async fn create(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Json(body): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let store_id = user.store_scope()?;
    check_assignable(body.role)?;
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let created = AuthService::new(state.pool())
        .create_user(Some(store_id), &body.email, body.name.trim(), body.role, &body.password)
        .await?;
    tracing::info!(user_id = %created.id, "staff account created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Change a staff member's name, role or active flag.
///
/// # Errors
///
/// Returns 404 if the user is not in the store and 400 when owners try to
/// demote or disable themselves.
#[instrument(skip(state, user, body))]
pub async fn update(
    RequireOwner(user): RequireOwner,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateUserInput>,
) -> Result<Json<User>, AppError> {
    let store_id = user.store_scope()?;
    if let Some(role) = body.role {
        check_assignable(role)?;
    }
    if id == user.id && (body.is_active == Some(false) || body.role.is_some_and(|r| r != user.role)) {
        return Err(AppError::BadRequest(
            "you cannot change your own role or disable yourself".to_string(),
        ));
    }
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    Ok(Json(
        UserRepository::new(state.pool())
            .update(store_id, id, &body)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owners_cannot_mint_super_admins() {
        assert!(check_assignable(UserRole::SuperAdmin).is_err());
        assert!(check_assignable(UserRole::Cashier).is_ok());
        assert!(check_assignable(UserRole::Owner).is_ok());
    }
}
