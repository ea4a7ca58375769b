//! Core types for Tableside.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod license;
pub mod money;
pub mod status;
pub mod sync;

pub use email::{Email, EmailError};
pub use id::*;
pub use license::{
    LICENSE_ISSUER, LicenseClaims, LicenseKey, LicenseKeyError, MAX_FINGERPRINT_LEN, fingerprint_hash,
};
pub use money::{MAX_AMOUNT, MAX_LINE_QUANTITY, MoneyError, OrderLine, OrderTotals, round_money};
pub use status::*;
pub use sync::*;
