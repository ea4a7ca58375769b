//! Session-related types for staff authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use tableside_core::{Email, StoreId, UserId, UserRole};

use crate::error::AppError;

/// Session-stored staff identity.
///
/// Minimal data stored in the session to identify the logged-in user and the
/// store (tenant) every request is scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Tenant; `None` only for platform super admins.
    pub store_id: Option<StoreId>,
    /// User's email address.
    pub email: Email,
    /// User's display name.
    pub name: String,
    /// User's role/permission level.
    pub role: UserRole,
}

impl CurrentUser {
    /// The store every query of this request must be scoped to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for platform users that are not attached
    /// to a store.
    pub fn store_scope(&self) -> Result<StoreId, AppError> {
        self.store_id.ok_or_else(|| {
            AppError::Forbidden("this account is not attached to a store".to_string())
        })
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(store_id: Option<StoreId>, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            store_id,
            email: Email::parse("staff@cafe.example").unwrap(),
            name: "Staff".to_string(),
            role,
        }
    }

    #[test]
    fn test_store_scope_for_store_user() {
        let u = user(Some(StoreId::new(9)), UserRole::Cashier);
        assert_eq!(u.store_scope().unwrap(), StoreId::new(9));
    }

    #[test]
    fn test_store_scope_for_platform_user() {
        let u = user(None, UserRole::SuperAdmin);
        assert!(matches!(u.store_scope(), Err(AppError::Forbidden(_))));
    }
}
