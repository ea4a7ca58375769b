//! Full flow on a live database: provision a store, license a terminal,
//! sell offline, sync, and revoke.
//!
//! These tests require a `PostgreSQL` database in `POS_DATABASE_URL`.
//!
//! Run with: cargo test -p tableside-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use tableside_core::{
    LicensePlan, LicenseStatus, OrderStatus, PaymentMethod, ProductId, TableId, UserRole,
};
use tableside_integration_tests::{CRON_SECRET, LICENSE_PUBLIC_PEM, TestContext};
use tableside_offline::{
    ClientError, LicenseGate, LicenseState, LocalStore, NewLocalItem, NewLocalOrder, SyncClient, SyncError,
    Synchronizer, activate,
};
use tableside_server::db::StoreRepository;
use tableside_server::services::{AuthService, LicenseService};

const PASSWORD: &str = "correct horse battery";

/// Log in and keep the session cookie.
async fn owner_client(ctx: &TestContext, email: &str) -> Client {
    let client = Client::builder().cookie_store(true).build().unwrap();
    let resp = client
        .post(ctx.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

async fn post_json(client: &Client, url: String, body: Value) -> Value {
    let resp = client.post(url).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn get_json(client: &Client, url: String) -> Value {
    let resp = client.get(url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

fn id_of(value: &Value) -> i32 {
    i32::try_from(value["id"].as_i64().unwrap()).unwrap()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (POS_DATABASE_URL)"]
async fn test_license_terminal_and_sync_flow() {
    let ctx = TestContext::new().await;

    let store = StoreRepository::new(&ctx.pool)
        .create("Integration Café", &ctx.unique("cafe"), "USD", Decimal::new(8, 2))
        .await
        .unwrap();
    let email = format!("{}@example.com", ctx.unique("owner"));
    AuthService::new(&ctx.pool)
        .create_user(Some(store.id), &email, "Owner", UserRole::Owner, PASSWORD)
        .await
        .unwrap();

    let owner = owner_client(&ctx, &email).await;
    let product = post_json(
        &owner,
        ctx.url("/api/products"),
        json!({ "name": "Flat White", "price": "4.10", "track_inventory": true, "stock_quantity": 10 }),
    )
    .await;
    let table = post_json(&owner, ctx.url("/api/tables"), json!({ "label": "Window", "seats": 2 })).await;

    let license = LicenseService::new(&ctx.pool, &ctx.signer)
        .issue(store.id, LicensePlan::Basic, 1, None)
        .await
        .unwrap();

    // Terminal side
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::open(&dir.path().join("till.db")).await.unwrap();
    let client = SyncClient::new(&ctx.base_url).unwrap();

    let summary = activate(&local, &client, &license.key, "till-1", Some("Front till"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.store_id, store.id);
    assert_eq!(summary.active_devices, 1);

    let sync = Synchronizer::new(local.clone(), client.clone());
    sync.refresh_catalog().await.unwrap();

    let gate = LicenseGate::new(local.clone(), LICENSE_PUBLIC_PEM, "till-1").unwrap();
    assert!(matches!(
        gate.check(chrono::Utc::now()).await,
        Ok(LicenseState::Valid { .. })
    ));

    let order = local
        .record_order(&NewLocalOrder {
            table_id: Some(TableId::new(id_of(&table))),
            notes: None,
            items: vec![NewLocalItem {
                product_id: ProductId::new(id_of(&product)),
                quantity: 2,
                notes: None,
            }],
        })
        .await
        .unwrap();
    local
        .update_order_status(order.id, OrderStatus::Paid, Some(PaymentMethod::Cash))
        .await
        .unwrap();

    let report = sync.sync_once().await.unwrap();
    assert_eq!((report.pushed, report.accepted, report.rejected), (1, 1, 0));

    // Server side: 2 x 4.10 = 8.20, tax 0.656 -> 0.66
    let orders = get_json(&owner, ctx.url("/api/orders")).await;
    let synced = orders
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["id"] == json!(order.id))
        .unwrap();
    assert_eq!(synced["status"], "paid");
    assert_eq!(synced["source"], "offline");
    assert_eq!(synced["total"], "8.86");

    let inventory = get_json(&owner, ctx.url("/api/inventory")).await;
    let item = inventory
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["product_id"] == product["id"])
        .unwrap();
    assert_eq!(item["stock_quantity"], 8);

    // The license allows one device.
    let second = LocalStore::open_in_memory().await.unwrap();
    let err = activate(&second, &client, &license.key, "till-2", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Client(ClientError::Status { status: 403, ref message }) if message == "device_limit_reached"
    ));

    // Revoked licenses stop syncing; the order stays queued on the device.
    LicenseService::new(&ctx.pool, &ctx.signer)
        .transition(license.id, LicenseStatus::Revoked)
        .await
        .unwrap();
    local
        .record_order(&NewLocalOrder {
            items: vec![NewLocalItem {
                product_id: ProductId::new(id_of(&product)),
                quantity: 1,
                notes: None,
            }],
            ..NewLocalOrder::default()
        })
        .await
        .unwrap();
    assert!(matches!(
        sync.sync_once().await,
        Err(SyncError::Client(ClientError::Status { status: 403, .. }))
    ));
    assert_eq!(local.sync_counts().await.unwrap().pending, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (POS_DATABASE_URL)"]
async fn test_cron_license_sweep() {
    let ctx = TestContext::new().await;

    let resp = Client::new()
        .post(ctx.url("/api/cron/licenses"))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let report: Value = resp.json().await.unwrap();
    assert!(report["expired"].is_u64());
    assert!(report["warned"].is_u64());
}
