//! Tableside CLI - migrations, provisioning and terminal tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! tp-cli migrate
//!
//! # Create a store and its owner
//! tp-cli store create --name "Blue Door" --currency EUR --tax-rate 0.2
//! TP_USER_PASSWORD=... tp-cli user create -s 1 -e owner@example.com -n "Ada" -r owner
//!
//! # Licenses
//! tp-cli license issue --store 1 --plan pro --max-devices 3
//! tp-cli license list --store 1
//! tp-cli license revoke 4
//! tp-cli license sweep
//!
//! # Scheduled backup of every active store
//! tp-cli backup run
//!
//! # Terminal side (local SQLite file)
//! tp-cli offline --db till.db --server https://pos.example.com activate ABCD-EFGH-JKLM-NPQR --fingerprint till-1
//! tp-cli offline --db till.db --server https://pos.example.com sync
//! tp-cli offline --db till.db status
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use tableside_core::{LicenseId, LicensePlan, StoreId, UserRole};

mod commands;

#[derive(Parser)]
#[command(name = "tp-cli")]
#[command(author, version, about = "Tableside CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage stores
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Manage staff accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage licenses
    License {
        #[command(subcommand)]
        action: LicenseAction,
    },
    /// Store backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Terminal tools against a local SQLite file
    Offline {
        /// Local database file
        #[arg(long, env = "TP_OFFLINE_DB", default_value = "tableside.db")]
        db: PathBuf,

        /// Server base URL
        #[arg(long, env = "TP_SERVER_URL")]
        server: Option<String>,

        #[command(subcommand)]
        action: OfflineAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Create a new store
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// URL handle (derived from the name when omitted)
        #[arg(long)]
        slug: Option<String>,

        /// ISO 4217 currency code
        #[arg(long, default_value = "USD")]
        currency: String,

        /// Sales tax as a fraction (0.08 = 8%)
        #[arg(long, default_value = "0")]
        tax_rate: Decimal,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a staff account
    Create {
        /// Store ID (omit for a super admin)
        #[arg(short, long)]
        store: Option<StoreId>,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`super_admin`, `owner`, `manager`, `cashier`)
        #[arg(short, long, default_value = "cashier")]
        role: UserRole,

        /// Password (prefer `TP_USER_PASSWORD` to keep it out of shell history)
        #[arg(long, env = "TP_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum LicenseAction {
    /// Issue a license for a store
    Issue {
        /// Store ID
        #[arg(short, long)]
        store: StoreId,

        /// Plan (`trial`, `basic`, `pro`)
        #[arg(short, long, default_value = "basic")]
        plan: LicensePlan,

        /// Maximum number of registered terminals
        #[arg(long, default_value_t = 1)]
        max_devices: i32,

        /// Expiry (RFC 3339); never expires when omitted
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Revoke a license
    Revoke {
        /// License ID
        id: LicenseId,
    },
    /// List licenses
    List {
        /// Only this store's licenses
        #[arg(short, long)]
        store: Option<StoreId>,
    },
    /// Expire overdue licenses and send expiry warnings
    Sweep,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Back up every active store and prune old files
    Run,
}

#[derive(Subcommand)]
enum OfflineAction {
    /// Register this terminal and cache its license token and catalog
    Activate {
        /// License key
        key: String,

        /// Stable device identifier
        #[arg(short, long, env = "TP_DEVICE_FINGERPRINT")]
        fingerprint: String,

        /// Human-readable device name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Push pending orders once, then refresh the catalog
    Sync {
        /// Move failed orders back to pending first
        #[arg(long)]
        retry_failed: bool,
    },
    /// Show sync counters and the cached license state
    Status {
        /// Server public key (PEM or path) to verify the cached token
        #[arg(long, env = "LICENSE_PUBLIC_KEY")]
        public_key: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tp_cli=info,tableside_server=info,tableside_offline=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Store { action } => match action {
            StoreAction::Create {
                name,
                slug,
                currency,
                tax_rate,
            } => commands::stores::create(&name, slug.as_deref(), &currency, tax_rate).await?,
        },
        Commands::User { action } => match action {
            UserAction::Create {
                store,
                email,
                name,
                role,
                password,
            } => commands::users::create(store, &email, &name, role, &password).await?,
        },
        Commands::License { action } => match action {
            LicenseAction::Issue {
                store,
                plan,
                max_devices,
                expires_at,
            } => commands::licenses::issue(store, plan, max_devices, expires_at).await?,
            LicenseAction::Revoke { id } => commands::licenses::revoke(id).await?,
            LicenseAction::List { store } => commands::licenses::list(store).await?,
            LicenseAction::Sweep => commands::licenses::sweep().await?,
        },
        Commands::Backup { action } => match action {
            BackupAction::Run => commands::backups::run().await?,
        },
        Commands::Offline { db, server, action } => match action {
            OfflineAction::Activate {
                key,
                fingerprint,
                name,
            } => {
                commands::offline::activate(&db, server.as_deref(), &key, &fingerprint, name.as_deref())
                    .await?;
            }
            OfflineAction::Sync { retry_failed } => {
                commands::offline::sync(&db, server.as_deref(), retry_failed).await?;
            }
            OfflineAction::Status { public_key } => {
                commands::offline::status(&db, public_key.as_deref()).await?;
            }
        },
    }
    Ok(())
}
