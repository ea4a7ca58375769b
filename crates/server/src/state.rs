//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::license::{LicenseError, LicenseSigner};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    signer: LicenseSigner,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the license key pair in `config` cannot be loaded.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, LicenseError> {
        let signer = LicenseSigner::from_config(&config.license)?;
        Ok(Self::with_signer(config, pool, signer))
    }

    /// Create application state around an already loaded signer.
    #[must_use]
    pub fn with_signer(config: ServerConfig, pool: PgPool, signer: LicenseSigner) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                signer,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the license token signer.
    #[must_use]
    pub fn signer(&self) -> &LicenseSigner {
        &self.inner.signer
    }
}
