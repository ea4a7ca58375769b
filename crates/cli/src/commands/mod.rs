//! Subcommand implementations.
//!
//! Server-side commands talk to `PostgreSQL` directly through the server
//! crate's repositories and services. `offline` works on a terminal's local
//! SQLite file.

pub mod backups;
pub mod licenses;
pub mod migrate;
pub mod offline;
pub mod stores;
pub mod users;

use secrecy::SecretString;
use serde::Serialize;
use sqlx::PgPool;

/// Errors shared by the database-backed commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Connect to `POS_DATABASE_URL` (or `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("POS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("POS_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = tableside_server::db::create_pool(&SecretString::from(database_url)).await?;
    Ok(pool)
}

/// Write a value to stdout as pretty JSON.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
