//! Staff user domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tableside_core::{Email, StoreId, UserId, UserRole};

use super::session::CurrentUser;

/// A staff member (or platform super admin). Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub store_id: Option<StoreId>,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            store_id: user.store_id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Body of `POST /api/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub password: String,
}

/// Body of `PATCH /api/users/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}
