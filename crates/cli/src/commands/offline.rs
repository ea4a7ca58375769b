//! Terminal tools: activate a device, force a sync, inspect the local file.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use tableside_offline::{
    LicenseGate, LicenseState, LocalStore, SyncClient, SyncCounts, Synchronizer, activate as activate_terminal,
};

use super::{CommandError, print_json};

fn client(server: Option<&str>) -> Result<SyncClient, Box<dyn std::error::Error>> {
    let server = server.ok_or(CommandError::MissingEnvVar("TP_SERVER_URL"))?;
    Ok(SyncClient::new(server)?)
}

/// Activate this terminal and download the catalog.
pub async fn activate(
    db: &Path,
    server: Option<&str>,
    key: &str,
    fingerprint: &str,
    device_name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = client(server)?;
    let store = LocalStore::open(db).await?;

    let summary = activate_terminal(&store, &client, key, fingerprint, device_name).await?;
    Synchronizer::new(store, client).refresh_catalog().await?;

    tracing::info!(db = %db.display(), "Terminal activated, catalog cached");
    if let Some(summary) = summary {
        print_json(&summary)?;
    }
    Ok(())
}

/// Push one batch of pending orders, then refresh the catalog.
pub async fn sync(db: &Path, server: Option<&str>, retry_failed: bool) -> Result<(), Box<dyn std::error::Error>> {
    let client = client(server)?;
    let store = LocalStore::open(db).await?;

    if retry_failed {
        let requeued = store.requeue_failed().await?;
        tracing::info!(requeued, "Failed orders queued again");
    }

    let sync = Synchronizer::new(store, client);
    let report = sync.sync_once().await?;
    print_json(&report)?;

    sync.refresh_catalog().await?;
    tracing::info!("Catalog refreshed");
    Ok(())
}

#[derive(Serialize)]
struct Status {
    activated: bool,
    orders: SyncCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    license: Option<LicenseState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    license_error: Option<String>,
}

/// Print sync counters and, given the server's public key, whether the
/// cached license still allows taking orders.
pub async fn status(db: &Path, public_key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let store = LocalStore::open(db).await?;
    let orders = store.sync_counts().await?;
    let stored = store.license().await?;

    let mut status = Status {
        activated: stored.is_some(),
        orders,
        license: None,
        license_error: None,
    };

    if let (Some(stored), Some(public_key)) = (stored, public_key) {
        let pem = read_public_key(public_key)?;
        let gate = LicenseGate::new(store, &pem, &stored.fingerprint)?;
        match gate.check(Utc::now()).await {
            Ok(state) => status.license = Some(state),
            Err(e) => status.license_error = Some(e.to_string()),
        }
    }

    print_json(&status)?;
    Ok(())
}

/// Accept either an inline PEM (with literal `\n` allowed) or a file path.
fn read_public_key(value: &str) -> Result<String, std::io::Error> {
    if value.contains("-----BEGIN") {
        return Ok(value.replace("\\n", "\n"));
    }
    std::fs::read_to_string(value.trim())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use tableside_core::{CatalogProduct, CatalogSnapshot, ProductId, StoreId};
    use tableside_offline::{NewLocalItem, NewLocalOrder};

    use super::*;

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot {
            store_id: StoreId::new(7),
            currency: "USD".to_string(),
            tax_rate: Decimal::ZERO,
            products: vec![CatalogProduct {
                id: ProductId::new(1),
                name: "Espresso".to_string(),
                sku: None,
                category: None,
                price: Decimal::new(250, 2),
            }],
            tables: vec![],
        }
    }

    #[tokio::test]
    async fn test_sync_pushes_even_when_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("till.db");
        let store = LocalStore::open(&db).await.unwrap();
        store.replace_catalog(&catalog()).await.unwrap();
        store.save_license("ABCD-EFGH-JKLM-NPQR", "till-1", "tok").await.unwrap();
        let order = store
            .record_order(&NewLocalOrder {
                items: vec![NewLocalItem {
                    product_id: ProductId::new(1),
                    quantity: 1,
                    notes: None,
                }],
                ..NewLocalOrder::default()
            })
            .await
            .unwrap();

        let server = MockServer::start_async().await;
        let push = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(200)
                    .json_body(json!({ "accepted": [order.id], "rejected": [] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/sync/catalog");
                then.status(500).json_body(json!({ "error": "Internal server error" }));
            })
            .await;

        assert!(sync(&db, Some(&server.base_url()), false).await.is_err());
        push.assert_async().await;
        assert_eq!(store.sync_counts().await.unwrap().pending, 0);
    }

    #[test]
    fn test_read_public_key_inline() {
        let pem = read_public_key("-----BEGIN PUBLIC KEY-----\\nabc\\n-----END PUBLIC KEY-----").unwrap();
        assert_eq!(pem, "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----");
    }

    #[test]
    fn test_read_public_key_missing_file() {
        assert!(read_public_key("/nonexistent/key.pem").is_err());
    }
}
