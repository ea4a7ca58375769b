//! Domain models for the POS server.
//!
//! These are validated domain types returned by repositories and serialized
//! directly as JSON API responses. Input types (`Create*`, `Update*`) are the
//! deserialized request bodies.

pub mod backup;
pub mod inventory;
pub mod license;
pub mod notification;
pub mod order;
pub mod product;
pub mod session;
pub mod store;
pub mod table;
pub mod user;

pub use backup::{Backup, BackupTrigger};
pub use inventory::{InventoryItem, InventoryMovement};
pub use license::{License, LicenseDevice};
pub use notification::{NewNotification, Notification};
pub use order::{Order, OrderFilter, OrderItem, OrderWithItems};
pub use product::{CreateProductInput, Product, UpdateProductInput};
pub use session::{CurrentUser, keys as session_keys};
pub use store::{Store, UpdateStoreInput};
pub use table::{CreateTableInput, DiningTable, UpdateTableInput};
pub use user::User;
