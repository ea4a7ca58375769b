//! Notification repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tableside_core::{NotificationId, NotificationKind, StoreId, UserId};

use super::RepositoryError;
use crate::models::notification::{NewNotification, Notification};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i32,
    store_id: i32,
    user_id: Option<i32>,
    kind: NotificationKind,
    title: String,
    body: String,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::new(row.id),
            store_id: StoreId::new(row.store_id),
            user_id: row.user_id.map(UserId::new),
            kind: row.kind,
            title: row.title,
            body: row.body,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, store_id, user_id, kind, title, body, read_at, created_at";

/// Notifications visible to a user: store-wide ones plus their own.
const VISIBLE_TO: &str = "store_id = $1 AND (user_id IS NULL OR user_id = $2)";

/// Repository for in-app notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewNotification) -> Result<Notification, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        create(&mut conn, new).await
    }

    /// Notifications visible to a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        store_id: StoreId,
        user_id: UserId,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pos.notification \
             WHERE {VISIBLE_TO} AND (NOT $3 OR read_at IS NULL) \
             ORDER BY created_at DESC, id DESC LIMIT $4"
        ))
        .bind(store_id)
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every notification of a store, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(&self, store_id: StoreId) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM pos.notification \
             WHERE store_id = $1 ORDER BY created_at"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of unread notifications visible to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, store_id: StoreId, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM pos.notification WHERE {VISIBLE_TO} AND read_at IS NULL"
        ))
        .bind(store_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification is not visible
    /// to the user.
    pub async fn mark_read(
        &self,
        store_id: StoreId,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE pos.notification SET read_at = COALESCE(read_at, NOW()) \
             WHERE {VISIBLE_TO} AND id = $3"
        ))
        .bind(store_id)
        .bind(user_id)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark every notification visible to a user read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    pub async fn mark_all_read(&self, store_id: StoreId, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE pos.notification SET read_at = NOW() WHERE {VISIBLE_TO} AND read_at IS NULL"
        ))
        .bind(store_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Insert a notification on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn create(
    conn: &mut PgConnection,
    new: &NewNotification,
) -> Result<Notification, RepositoryError> {
    let row = sqlx::query_as::<_, NotificationRow>(&format!(
        "INSERT INTO pos.notification (store_id, user_id, kind, title, body) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(new.store_id)
    .bind(new.user_id)
    .bind(new.kind)
    .bind(&new.title)
    .bind(&new.body)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}
