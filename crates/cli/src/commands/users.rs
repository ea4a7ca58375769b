//! Staff account provisioning.
//!
//! The first owner of a new store (and every super admin) has to be created
//! here since the API only lets owners add staff to their own store.

use tableside_core::{StoreId, UserRole};
use tableside_server::db::StoreRepository;
use tableside_server::services::AuthService;

use super::{CommandError, connect};

/// Create a staff account.
///
/// Super admins belong to no store; every other role needs `store`.
pub async fn create(
    store: Option<StoreId>,
    email: &str,
    name: &str,
    role: UserRole,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match (role, store) {
        (UserRole::SuperAdmin, Some(_)) => {
            return Err(CommandError::InvalidArgument(
                "super admins cannot belong to a store".to_string(),
            )
            .into());
        }
        (UserRole::Owner | UserRole::Manager | UserRole::Cashier, None) => {
            return Err(CommandError::InvalidArgument(format!("--store is required for role {role}")).into());
        }
        _ => {}
    }

    let pool = connect().await?;

    if let Some(store_id) = store {
        if StoreRepository::new(&pool).get_by_id(store_id).await?.is_none() {
            return Err(CommandError::InvalidArgument(format!("store {store_id} not found")).into());
        }
    }

    let user = AuthService::new(&pool)
        .create_user(store, email, name, role, password)
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok(())
}
