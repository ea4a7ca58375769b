//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `POS_BASE_URL` - Public URL of the server
//! - `POS_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `LICENSE_PRIVATE_KEY` - RSA private key (PEM, or a path to a PEM file)
//! - `LICENSE_PUBLIC_KEY` - RSA public key (PEM, or a path to a PEM file)
//!
//! ## Optional
//! - `POS_HOST` - Bind address (default: 127.0.0.1)
//! - `POS_PORT` - Listen port (default: 3000)
//! - `CRON_SECRET` - Bearer secret for `/api/cron/*` (cron routes are disabled when unset)
//! - `BACKUP_DIR` - Directory for scheduled backups (default: ./backups)
//! - `BACKUP_RETENTION` - Backup files kept per store (default: 14)
//! - `LICENSE_TOKEN_TTL_DAYS` - Lifetime of issued license tokens (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (TLS)
//! - `POS_TLS_CERT` - PEM-encoded certificate chain
//! - `POS_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
const DEFAULT_BACKUP_RETENTION: usize = 14;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP` instead of the
    /// socket peer. Only safe behind a reverse proxy that sets them.
    pub trust_proxy: bool,
    /// Public base URL of the server
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// License signing keys
    pub license: LicenseKeysConfig,
    /// Bearer secret for cron routes; `None` disables them
    pub cron_secret: Option<SecretString>,
    /// Scheduled backup settings
    pub backup: BackupConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// RSA key pair used to sign and verify license tokens.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct LicenseKeysConfig {
    /// PEM-encoded RSA private key
    pub private_key_pem: SecretString,
    /// PEM-encoded RSA public key
    pub public_key_pem: String,
    /// Lifetime of an issued token in days
    pub token_ttl_days: i64,
}

impl std::fmt::Debug for LicenseKeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseKeysConfig")
            .field("private_key_pem", &"[REDACTED]")
            .field("public_key_pem", &"[PUBLIC KEY]")
            .field("token_ttl_days", &self.token_ttl_days)
            .finish()
    }
}

impl LicenseKeysConfig {
    /// Load the key pair from `LICENSE_PRIVATE_KEY` / `LICENSE_PUBLIC_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a key is missing or the TTL is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let private_key_pem = read_pem("LICENSE_PRIVATE_KEY")?;
        let public_key_pem = read_pem("LICENSE_PUBLIC_KEY")?;
        let token_ttl_days = get_env_or_default(
            "LICENSE_TOKEN_TTL_DAYS",
            &DEFAULT_TOKEN_TTL_DAYS.to_string(),
        )
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidEnvVar("LICENSE_TOKEN_TTL_DAYS".to_string(), e.to_string()))?;
        if token_ttl_days < 1 {
            return Err(ConfigError::InvalidEnvVar(
                "LICENSE_TOKEN_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            private_key_pem: SecretString::from(private_key_pem),
            public_key_pem,
            token_ttl_days,
        })
    }
}

/// Scheduled backup settings.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Root directory; each store gets a `{slug}/` subdirectory
    pub dir: PathBuf,
    /// Number of backup files kept per store
    pub retention: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./backups"),
            retention: DEFAULT_BACKUP_RETENTION,
        }
    }
}

impl BackupConfig {
    /// Load `BACKUP_DIR` and `BACKUP_RETENTION`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the retention is not a positive number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dir = PathBuf::from(get_env_or_default("BACKUP_DIR", "./backups"));
        let retention = get_env_or_default("BACKUP_RETENTION", &DEFAULT_BACKUP_RETENTION.to_string())
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar("BACKUP_RETENTION".to_string(), e.to_string()))?;
        if retention == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BACKUP_RETENTION".to_string(),
                "must keep at least one backup".to_string(),
            ));
        }
        Ok(Self { dir, retention })
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("POS_TLS_CERT");
        let key_pem = get_optional_env("POS_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "POS_TLS_*".to_string(),
                "Both POS_TLS_CERT and POS_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("POS_DATABASE_URL")?;
        let host = get_env_or_default("POS_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("POS_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("POS_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("POS_PORT".to_string(), e.to_string()))?;
        let trust_proxy = parse_flag(
            "POS_TRUST_PROXY",
            &get_env_or_default("POS_TRUST_PROXY", "false"),
        )?;
        let base_url = get_required_env("POS_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("POS_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("POS_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "POS_SESSION_SECRET")?;

        let license = LicenseKeysConfig::from_env()?;
        let cron_secret = get_optional_env("CRON_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "CRON_SECRET")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;
        let backup = BackupConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            trust_proxy,
            base_url,
            session_secret,
            license,
            cron_secret,
            backup,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a PEM value given inline or as a path to a file.
fn read_pem(key: &str) -> Result<String, ConfigError> {
    let raw = get_required_env(key)?;
    let pem = normalize_pem(&raw).map_or_else(
        || {
            std::fs::read_to_string(raw.trim())
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        },
        Ok,
    )?;
    if !pem.contains("-----BEGIN") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "not a PEM document".to_string(),
        ));
    }
    Ok(pem)
}

/// Inline PEM values often arrive with literal `\n` sequences.
///
/// Returns `None` when the value is not inline PEM.
fn normalize_pem(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    trimmed
        .starts_with("-----BEGIN")
        .then(|| trimmed.replace("\\n", "\n"))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected true or false, got {other:?}"),
        )),
    }
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
