//! Errors of the offline terminal.

use chrono::{DateTime, Utc};
use thiserror::Error;

use tableside_core::{MoneyError, OrderId, OrderStatus, ProductId, TableId};

/// Errors from the local SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored value no longer parses (hand-edited file, newer schema).
    #[error("corrupt local data: {0}")]
    Corrupt(String),

    #[error("no catalog cached yet; sync with the server first")]
    NoCatalog,

    #[error("product {0} is not in the cached catalog")]
    UnknownProduct(ProductId),

    #[error("table {0} is not in the cached catalog")]
    UnknownTable(TableId),

    #[error("invalid order: {0}")]
    InvalidOrder(#[from] MoneyError),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order is already {0}")]
    OrderClosed(OrderStatus),

    #[error("a payment method is required to mark an order paid")]
    PaymentMethodRequired,
}

/// Errors talking to the server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// The request never got an HTTP answer (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether the failure happened before the server could answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors of a sync run or an activation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("terminal is not activated")]
    NotActivated,

    #[error("license refused: {0}")]
    Refused(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Reasons the terminal may not take orders.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("no license token stored; activate the terminal first")]
    Missing,

    #[error("license token is invalid: {0}")]
    Invalid(String),

    #[error("license token was issued to another device")]
    DeviceMismatch,

    #[error("license expired at {expired_at} and the grace period is over")]
    Expired { expired_at: DateTime<Utc> },

    #[error("invalid license public key: {0}")]
    Key(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
