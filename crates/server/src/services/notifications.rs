//! Notification fan-out and inbox queries.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use tableside_core::{NotificationId, NotificationKind, StoreId, UserId};

use crate::db::RepositoryError;
use crate::db::notifications::NotificationRepository;
use crate::models::notification::{NewNotification, Notification};

/// Longest inbox page.
pub const MAX_PAGE: i64 = 100;

/// Query of `GET /api/notifications`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

impl InboxQuery {
    /// Page size, clamped to `1..=MAX_PAGE`.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, MAX_PAGE)
    }
}

/// Response of `GET /api/notifications/unread-count`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Notification service.
pub struct NotificationService<'a> {
    notifications: NotificationRepository<'a>,
}

impl<'a> NotificationService<'a> {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
        }
    }

    /// Notify every user of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn notify_store(
        &self,
        store_id: StoreId,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> Result<Notification, RepositoryError> {
        self.notifications
            .create(&NewNotification::store_wide(store_id, kind, title, body))
            .await
    }

    /// Notify a single user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn notify_user(
        &self,
        store_id: StoreId,
        user_id: UserId,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> Result<Notification, RepositoryError> {
        self.notifications
            .create(&NewNotification {
                store_id,
                user_id: Some(user_id),
                kind,
                title: title.to_string(),
                body: body.to_string(),
            })
            .await
    }

    /// A user's inbox: store-wide notifications plus their own, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn inbox(
        &self,
        store_id: StoreId,
        user_id: UserId,
        query: &InboxQuery,
    ) -> Result<Vec<Notification>, RepositoryError> {
        self.notifications
            .list_for_user(store_id, user_id, query.unread_only, query.effective_limit())
            .await
    }

    /// Number of unread notifications in a user's inbox.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, store_id: StoreId, user_id: UserId) -> Result<UnreadCount, RepositoryError> {
        let unread = self.notifications.unread_count(store_id, user_id).await?;
        Ok(UnreadCount { unread })
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is not in the user's inbox.
    pub async fn mark_read(
        &self,
        store_id: StoreId,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), RepositoryError> {
        self.notifications.mark_read(store_id, user_id, id).await
    }

    /// Mark the whole inbox read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn mark_all_read(&self, store_id: StoreId, user_id: UserId) -> Result<u64, RepositoryError> {
        let changed = self.notifications.mark_all_read(store_id, user_id).await?;
        tracing::debug!(%store_id, %user_id, changed, "marked inbox read");
        Ok(changed)
    }
}
