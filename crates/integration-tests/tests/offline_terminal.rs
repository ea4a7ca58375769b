//! A terminal talking to a mocked server whose tokens come from the real
//! server signer.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use httpmock::prelude::*;
use serde_json::json;

use tableside_core::{
    LICENSE_ISSUER, LicenseClaims, LicenseId, LicensePlan, OrderStatus, PaymentMethod, ProductId, StoreId,
    SyncStatus, TableId, fingerprint_hash,
};
use tableside_integration_tests::{FOREIGN_PUBLIC_PEM, LICENSE_PUBLIC_PEM, test_signer};
use tableside_offline::{
    GateError, LicenseGate, LicenseState, LocalStore, NewLocalItem, NewLocalOrder, SyncClient, SyncReport,
    Synchronizer, activate,
};
use tableside_server::services::license::hash_fingerprint;

const KEY: &str = "ABCD-EFGH-JKLM-NPQR";

fn server_token(fingerprint: &str) -> String {
    let now = Utc::now();
    test_signer()
        .sign(&LicenseClaims {
            iss: LICENSE_ISSUER.to_string(),
            sub: KEY.to_string(),
            lic: LicenseId::new(11),
            store: StoreId::new(7),
            plan: LicensePlan::Pro,
            fp: hash_fingerprint(fingerprint).unwrap(),
            max_devices: 2,
            iat: now.timestamp(),
            exp: (now + Duration::days(30)).timestamp(),
        })
        .unwrap()
}

async fn mock_activation(server: &MockServer, fingerprint: &str) {
    let token = server_token(fingerprint);
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/license/validate");
            then.status(200).json_body(json!({
                "valid": true,
                "token": token,
                "license": {
                    "license_id": 11,
                    "store_id": 7,
                    "plan": "pro",
                    "expires_at": null,
                    "max_devices": 2,
                    "active_devices": 1
                }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/sync/catalog");
            then.status(200).json_body(json!({
                "store_id": 7,
                "currency": "USD",
                "tax_rate": "0.0825",
                "products": [
                    { "id": 1, "name": "Flat White", "sku": "FW", "category": "Coffee", "price": "4.10" },
                    { "id": 2, "name": "Banana Bread", "sku": null, "category": null, "price": "3.35" }
                ],
                "tables": [
                    { "id": 4, "label": "Window", "seats": 2, "status": "available" }
                ]
            }));
        })
        .await;
}

#[test]
fn test_server_validation_hashes_like_the_terminal() {
    for fingerprint in ["till-1", "  padded-device  ", "9f2c-ANDROID-ÄÖÜ"] {
        assert_eq!(fingerprint_hash(fingerprint), hash_fingerprint(fingerprint).unwrap());
    }
}

#[tokio::test]
async fn test_activate_sell_offline_and_sync() {
    let server = MockServer::start_async().await;
    mock_activation(&server, "till-1").await;

    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(&dir.path().join("till.db")).await.unwrap();
    let client = SyncClient::new(&server.base_url()).unwrap();

    let summary = activate(&store, &client, KEY, "till-1", Some("Front till"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.store_id, StoreId::new(7));

    let sync = Synchronizer::new(store.clone(), client);
    sync.refresh_catalog().await.unwrap();

    let gate = LicenseGate::new(store.clone(), LICENSE_PUBLIC_PEM, "till-1").unwrap();
    assert!(matches!(gate.check(Utc::now()).await, Ok(LicenseState::Valid { .. })));

    // 2 x 4.10 + 3.35 = 11.55, tax 8.25% = 0.952875 -> 0.95
    let order = store
        .record_order(&NewLocalOrder {
            table_id: Some(TableId::new(4)),
            notes: None,
            items: vec![
                NewLocalItem {
                    product_id: ProductId::new(1),
                    quantity: 2,
                    notes: Some("oat milk".to_string()),
                },
                NewLocalItem {
                    product_id: ProductId::new(2),
                    quantity: 1,
                    notes: None,
                },
            ],
        })
        .await
        .unwrap();
    assert_eq!(order.totals.subtotal.to_string(), "11.55");
    assert_eq!(order.totals.tax.to_string(), "0.95");
    assert_eq!(order.totals.total.to_string(), "12.50");

    let order = store
        .update_order_status(order.id, OrderStatus::Paid, Some(PaymentMethod::Card))
        .await
        .unwrap();
    assert!(order.paid_at.is_some());

    let push = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/sync/orders")
                .header_exists("authorization")
                .body_contains(order.id.to_string())
                .body_contains("\"status\":\"paid\"");
            then.status(200)
                .json_body(json!({ "accepted": [order.id], "rejected": [] }));
        })
        .await;

    let report = sync.sync_once().await.unwrap();
    push.assert_async().await;
    assert_eq!(
        report,
        SyncReport {
            pushed: 1,
            accepted: 1,
            rejected: 0
        }
    );

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert_eq!(store.sync_counts().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_gate_rejects_other_device_and_other_server() {
    let store = LocalStore::open_in_memory().await.unwrap();
    let now = Utc::now();

    let ours = LicenseGate::new(store.clone(), LICENSE_PUBLIC_PEM, "till-1").unwrap();
    assert!(matches!(ours.evaluate(&server_token("till-1"), now), Ok(LicenseState::Valid { .. })));
    assert!(matches!(
        ours.evaluate(&server_token("till-2"), now),
        Err(GateError::DeviceMismatch)
    ));

    let theirs = LicenseGate::new(store, FOREIGN_PUBLIC_PEM, "till-1").unwrap();
    assert!(matches!(
        theirs.evaluate(&server_token("till-1"), now),
        Err(GateError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_orders_survive_an_unreachable_server() {
    let server = MockServer::start_async().await;
    mock_activation(&server, "till-1").await;

    let store = LocalStore::open_in_memory().await.unwrap();
    let client = SyncClient::new(&server.base_url()).unwrap();
    activate(&store, &client, KEY, "till-1", None).await.unwrap();
    Synchronizer::new(store.clone(), client).refresh_catalog().await.unwrap();

    store
        .record_order(&NewLocalOrder {
            items: vec![NewLocalItem {
                product_id: ProductId::new(2),
                quantity: 3,
                notes: None,
            }],
            ..NewLocalOrder::default()
        })
        .await
        .unwrap();

    let offline = Synchronizer::new(store.clone(), SyncClient::new("http://127.0.0.1:9").unwrap());
    assert!(offline.sync_once().await.is_err());
    assert!(offline.refresh_catalog().await.is_err());

    // The cached catalog and the order are still there.
    assert_eq!(store.catalog().await.unwrap().unwrap().products.len(), 2);
    assert_eq!(store.sync_counts().await.unwrap().pending, 1);
}
