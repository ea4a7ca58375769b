//! Tableside offline terminal support.
//!
//! A terminal keeps selling while the network is down:
//!
//! - [`LocalStore`] - SQLite cache of the catalog, the license token and
//!   every order taken on the device
//! - [`SyncClient`] - HTTP client for license validation and order sync
//! - [`Synchronizer`] - pushes pending orders, refreshes the catalog and
//!   renews the license token
//! - [`LicenseGate`] - verifies the cached license token without the server
//!
//! Order totals use the same [`tableside_core::OrderTotals`] math as the
//! server, so both sides agree on every cent.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod client;
pub mod error;
pub mod gate;
pub mod store;
pub mod sync;

pub use client::SyncClient;
pub use error::{ClientError, GateError, StoreError, SyncError};
pub use gate::{DEFAULT_GRACE_DAYS, LicenseGate, LicenseState};
pub use store::{LocalOrder, LocalStore, NewLocalItem, NewLocalOrder, StoredLicense, SyncCounts};
pub use sync::{RENEW_BEFORE_DAYS, SYNC_BATCH_SIZE, SyncReport, Synchronizer, activate};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use std::str::FromStr;

    use chrono::{DateTime, Utc};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use rust_decimal::Decimal;
    use tableside_core::{
        CatalogProduct, CatalogSnapshot, CatalogTable, LICENSE_ISSUER, LicenseClaims, LicenseId, LicensePlan,
        ProductId, StoreId, TableId, TableStatus, fingerprint_hash,
    };

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/license_private.pem");

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// A server-style token for device `fp` expiring at `exp`.
    pub fn signed_token(exp: DateTime<Utc>) -> String {
        let claims = LicenseClaims {
            iss: LICENSE_ISSUER.to_string(),
            sub: "ABCD-EFGH-JKLM-NPQR".to_string(),
            lic: LicenseId::new(1),
            store: StoreId::new(7),
            plan: LicensePlan::Basic,
            fp: fingerprint_hash("fp"),
            max_devices: 2,
            iat: Utc::now().timestamp(),
            exp: exp.timestamp(),
        };
        let key = EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap();
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    /// Two products (espresso 2.50, croissant 3.25), table 4, 8% tax.
    pub fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot {
            store_id: StoreId::new(7),
            currency: "USD".to_string(),
            tax_rate: dec("0.08"),
            products: vec![
                CatalogProduct {
                    id: ProductId::new(1),
                    name: "Espresso".to_string(),
                    sku: Some("ESP".to_string()),
                    category: Some("Coffee".to_string()),
                    price: dec("2.50"),
                },
                CatalogProduct {
                    id: ProductId::new(2),
                    name: "Croissant".to_string(),
                    sku: None,
                    category: None,
                    price: dec("3.25"),
                },
            ],
            tables: vec![CatalogTable {
                id: TableId::new(4),
                label: "T4".to_string(),
                seats: 2,
                status: TableStatus::Available,
            }],
        }
    }
}
