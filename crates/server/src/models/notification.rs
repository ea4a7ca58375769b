//! Notification domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tableside_core::{NotificationId, NotificationKind, StoreId, UserId};

/// An in-app notification. `user_id = None` means every user of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub store_id: StoreId,
    pub user_id: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be created.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub store_id: StoreId,
    pub user_id: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl NewNotification {
    /// A store-wide notification.
    pub fn store_wide(
        store_id: StoreId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            store_id,
            user_id: None,
            kind,
            title: title.into(),
            body: body.into(),
        }
    }
}
