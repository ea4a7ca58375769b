//! Router-level tests that need no database.
//!
//! Every request here is answered before the first query: health checks, session
//! and bearer rejections, input validation, unknown routes.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

use tableside_core::{LICENSE_ISSUER, LicenseClaims, LicenseId, LicensePlan, StoreId};
use tableside_integration_tests::{
    CRON_SECRET, FOREIGN_PRIVATE_PEM, LICENSE_PUBLIC_PEM, app_without_database, send,
};
use tableside_server::services::LicenseSigner;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_bearer(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_is_up() {
    let app = app_without_database(None);
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_ready_reports_missing_database() {
    let app = app_without_database(None);
    let (status, body) = send(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_staff_routes_require_login() {
    let app = app_without_database(None);
    for uri in [
        "/api/auth/me",
        "/api/orders",
        "/api/products",
        "/api/inventory",
        "/api/tables",
        "/api/notifications",
        "/api/settings",
        "/api/licenses",
        "/api/backup/download",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "Not logged in", "{uri}");
    }
}

#[tokio::test]
async fn test_cron_disabled_without_secret() {
    let app = app_without_database(None);
    let (status, _) = send(&app, with_bearer(Method::POST, "/api/cron/backup", CRON_SECRET)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_cron_rejects_wrong_secret() {
    let app = app_without_database(Some(CRON_SECRET));

    let (status, _) = send(&app, get("/api/cron/licenses")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, with_bearer(Method::GET, "/api/cron/licenses", "not-the-secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_requires_license_token() {
    let app = app_without_database(None);

    let (status, _) = send(&app, get("/api/sync/catalog")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, with_bearer(Method::GET, "/api/sync/catalog", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_rejects_token_from_another_key() {
    let foreign = LicenseSigner::from_pem(FOREIGN_PRIVATE_PEM, LICENSE_PUBLIC_PEM, Duration::days(30)).unwrap();
    let now = Utc::now();
    let token = foreign
        .sign(&LicenseClaims {
            iss: LICENSE_ISSUER.to_string(),
            sub: "ABCD-EFGH-JKLM-NPQR".to_string(),
            lic: LicenseId::new(1),
            store: StoreId::new(1),
            plan: LicensePlan::Pro,
            fp: "0".repeat(64),
            max_devices: 1,
            iat: now.timestamp(),
            exp: (now + Duration::days(1)).timestamp(),
        })
        .unwrap();

    let app = app_without_database(None);
    let (status, _) = send(&app, with_bearer(Method::GET, "/api/sync/catalog", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// A license validation from `peer` claiming to be `forwarded_for`.
fn validate_request(peer: &str, forwarded_for: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/api/license/validate")
        .header("content-type", "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(
            json!({ "key": "not-a-key", "fingerprint": "till-1" }).to_string(),
        ))
        .unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

#[tokio::test]
async fn test_validate_refuses_malformed_key() {
    let app = app_without_database(None);
    let (status, body) = send(&app, validate_request("192.0.2.10:40000", "203.0.113.5")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "valid": false, "reason": "invalid_key_format" }));
}

#[tokio::test]
async fn test_validate_limit_ignores_forwarded_for() {
    let app = app_without_database(None);

    // Burst of 5 from one peer, each request claiming a new client IP.
    for i in 0..5 {
        let (status, _) = send(&app, validate_request("192.0.2.20:40000", &format!("203.0.113.{i}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "request {i}");
    }
    let (status, _) = send(&app, validate_request("192.0.2.20:40001", "198.51.100.77")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Another peer has its own budget.
    let (status, _) = send(&app, validate_request("192.0.2.21:40000", "203.0.113.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = app_without_database(None);
    let (status, _) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
