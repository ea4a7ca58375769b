//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password authentication and staff accounts
//! - `license` - License signing, issuance, validation and the expiry sweep
//! - `orders` - Order creation and status changes
//! - `inventory` - Stock adjustments and low-stock alerts
//! - `notifications` - Notification fan-out
//! - `backup` - Store snapshots, downloads and the scheduled backup job
//! - `sync` - Terminal authentication, catalog export and order upserts

pub mod auth;
pub mod backup;
pub mod inventory;
pub mod license;
pub mod notifications;
pub mod orders;
pub mod sync;

pub use auth::{AuthError, AuthService};
pub use backup::{BackupError, BackupService, BackupSnapshot};
pub use inventory::InventoryService;
pub use license::{LicenseError, LicenseService, LicenseSigner};
pub use notifications::NotificationService;
pub use orders::{OrderError, OrderService};
pub use sync::{SyncError, SyncService};
