//! Dining table repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tableside_core::{StoreId, TableId, TableStatus};

use super::RepositoryError;
use crate::models::table::{CreateTableInput, DiningTable, UpdateTableInput};

#[derive(Debug, sqlx::FromRow)]
struct TableRow {
    id: i32,
    store_id: i32,
    label: String,
    seats: i32,
    status: TableStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TableRow> for DiningTable {
    fn from(row: TableRow) -> Self {
        Self {
            id: TableId::new(row.id),
            store_id: StoreId::new(row.store_id),
            label: row.label,
            seats: row.seats,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TABLE_COLUMNS: &str = "id, store_id, label, seats, status, created_at, updated_at";
const LABEL_TAKEN: &str = "a table with this label already exists";

/// Repository for the floor plan.
pub struct TableRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TableRepository<'a> {
    /// Create a new table repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's tables by label.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<DiningTable>, RepositoryError> {
        let rows = sqlx::query_as::<_, TableRow>(&format!(
            "SELECT {TABLE_COLUMNS} FROM pos.dining_table WHERE store_id = $1 ORDER BY label"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a table of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: TableId,
    ) -> Result<Option<DiningTable>, RepositoryError> {
        let row = sqlx::query_as::<_, TableRow>(&format!(
            "SELECT {TABLE_COLUMNS} FROM pos.dining_table WHERE id = $1 AND store_id = $2"
        ))
        .bind(id)
        .bind(store_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a table.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the label is already used in the store.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &CreateTableInput,
    ) -> Result<DiningTable, RepositoryError> {
        let row = sqlx::query_as::<_, TableRow>(&format!(
            "INSERT INTO pos.dining_table (store_id, label, seats) \
             VALUES ($1, $2, $3) RETURNING {TABLE_COLUMNS}"
        ))
        .bind(store_id)
        .bind(&input.label)
        .bind(input.seats)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, LABEL_TAKEN))?;

        Ok(row.into())
    }

    /// Rename or resize a table.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the table is not in the store.
    /// Returns `RepositoryError::Conflict` if the new label is taken.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: TableId,
        input: &UpdateTableInput,
    ) -> Result<DiningTable, RepositoryError> {
        let row = sqlx::query_as::<_, TableRow>(&format!(
            "UPDATE pos.dining_table SET \
                 label = COALESCE($3, label), \
                 seats = COALESCE($4, seats), \
                 updated_at = NOW() \
             WHERE id = $1 AND store_id = $2 RETURNING {TABLE_COLUMNS}"
        ))
        .bind(id)
        .bind(store_id)
        .bind(input.label.as_deref())
        .bind(input.seats)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, LABEL_TAKEN))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Set a table's status directly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the table is not in the store.
    pub async fn set_status(
        &self,
        store_id: StoreId,
        id: TableId,
        status: TableStatus,
    ) -> Result<DiningTable, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        set_status(&mut conn, store_id, id, status)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a table that holds no open order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the table has open orders.
    /// Returns `RepositoryError::NotFound` if the table is not in the store.
    pub async fn delete(&self, store_id: StoreId, id: TableId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if has_open_orders(&mut tx, store_id, id).await? {
            return Err(RepositoryError::Conflict(
                "table has open orders".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM pos.dining_table WHERE id = $1 AND store_id = $2")
            .bind(id)
            .bind(store_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Lock a table row of a store for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: TableId,
) -> Result<Option<DiningTable>, RepositoryError> {
    let row = sqlx::query_as::<_, TableRow>(&format!(
        "SELECT {TABLE_COLUMNS} FROM pos.dining_table \
         WHERE id = $1 AND store_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Set a table's status, returning the updated table if it exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_status(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: TableId,
    status: TableStatus,
) -> Result<Option<DiningTable>, RepositoryError> {
    let row = sqlx::query_as::<_, TableRow>(&format!(
        "UPDATE pos.dining_table SET status = $3, updated_at = NOW() \
         WHERE id = $1 AND store_id = $2 RETURNING {TABLE_COLUMNS}"
    ))
    .bind(id)
    .bind(store_id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Whether any non-terminal order still sits at the table.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn has_open_orders(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: TableId,
) -> Result<bool, RepositoryError> {
    let open: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pos.order \
         WHERE store_id = $1 AND table_id = $2 AND status NOT IN ('paid', 'cancelled'))",
    )
    .bind(store_id)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(open)
}

/// Mark a table available once its last open order is settled.
///
/// `reserved` and `out_of_service` tables are left alone.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn release_if_idle(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: TableId,
) -> Result<(), RepositoryError> {
    if has_open_orders(conn, store_id, id).await? {
        return Ok(());
    }
    sqlx::query(
        "UPDATE pos.dining_table SET status = 'available', updated_at = NOW() \
         WHERE id = $1 AND store_id = $2 AND status = 'occupied'",
    )
    .bind(id)
    .bind(store_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
