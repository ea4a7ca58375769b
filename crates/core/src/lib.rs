//! Tableside Core - Shared types library.
//!
//! This crate provides common types used across all Tableside components:
//! - `server` - Multi-tenant POS backend (JSON API, licensing, backups)
//! - `offline` - Terminal-side cache and order sync client
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows the server and
//! the offline terminal to agree on money math and wire formats.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, statuses, money, license claims and sync DTOs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
