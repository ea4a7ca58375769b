//! Background order sync.
//!
//! License tokens are short-lived. The synchronizer renews the stored token
//! with the stored key and fingerprint shortly before it expires, and once
//! more if the server refuses it.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Serialize;
use tracing::instrument;

use tableside_core::{LicenseClaims, LicenseSummary, LicenseValidationRequest, SyncPushRequest};

use crate::client::SyncClient;
use crate::error::{ClientError, SyncError};
use crate::store::LocalStore;

/// Orders pushed per request.
pub const SYNC_BATCH_SIZE: i64 = 100;

/// Renew the license token once it expires within this many days.
pub const RENEW_BEFORE_DAYS: i64 = 7;

/// Outcome of one [`Synchronizer::sync_once`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Orders sent to the server.
    pub pushed: usize,
    /// Orders the server stored and that are now `synced`.
    pub accepted: usize,
    /// Orders the server refused, now `sync_failed`.
    pub rejected: usize,
}

/// Pushes pending orders and refreshes the catalog.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    store: LocalStore,
    client: SyncClient,
}

impl Synchronizer {
    /// Create a synchronizer over a local store and a server client.
    #[must_use]
    pub const fn new(store: LocalStore, client: SyncClient) -> Self {
        Self { store, client }
    }

    /// The stored token, renewed first when it is close to expiry. A failed
    /// renewal keeps the current token.
    async fn token(&self, now: DateTime<Utc>) -> Result<String, SyncError> {
        let token = self
            .store
            .license()
            .await?
            .map(|license| license.token)
            .ok_or(SyncError::NotActivated)?;

        if !renewal_due(&token, now) {
            return Ok(token);
        }
        match self.renew_license().await {
            Ok(fresh) => Ok(fresh),
            Err(SyncError::Client(e)) if e.is_transport() => {
                tracing::debug!(
                    error = %e,
                    "server unreachable, keeping the current license token"
                );
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "license renewal failed, keeping the current token");
                Ok(token)
            }
        }
    }

    /// Validate the stored key again and keep the new token.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotActivated` without a stored license, and the
    /// server's refusal otherwise (e.g. a revoked license).
    #[instrument(skip(self))]
    pub async fn renew_license(&self) -> Result<String, SyncError> {
        let stored = self.store.license().await?.ok_or(SyncError::NotActivated)?;
        let (token, _) =
            validate_and_store(&self.store, &self.client, &stored.key, &stored.fingerprint, None)
                .await?;
        tracing::info!("license token renewed");
        Ok(token)
    }

    /// Push one batch of pending orders.
    ///
    /// Accepted orders become `synced`, rejected ones `sync_failed` with the
    /// server's reason. When the request itself fails every order stays
    /// `pending_sync` for the next run.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotActivated` without a stored license, and the
    /// client or store error that stopped the run. A 401 is answered by one
    /// renewal and one retry.
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        let token = self.token(Utc::now()).await?;
        let pending = self.store.pending_orders(SYNC_BATCH_SIZE).await?;
        if pending.is_empty() {
            return Ok(SyncReport::default());
        }

        let revisions: HashMap<_, _> = pending.iter().map(|o| (o.id, o.revision)).collect();
        let request = SyncPushRequest {
            orders: pending.iter().map(|o| o.to_sync_order()).collect(),
        };

        let response = match self.client.push_orders(&token, &request).await {
            Err(ClientError::Status { status: 401, .. }) => {
                tracing::info!("license token refused, renewing");
                let token = self.renew_license().await?;
                self.client.push_orders(&token, &request).await?
            }
            other => other?,
        };

        let accepted: Vec<_> = response
            .accepted
            .iter()
            .filter_map(|id| revisions.get(id).map(|rev| (*id, *rev)))
            .collect();
        self.store.mark_synced(&accepted).await?;

        let mut rejected = 0;
        for refusal in &response.rejected {
            let Some(revision) = revisions.get(&refusal.id) else {
                tracing::warn!(order_id = %refusal.id, "server rejected an order that was not pushed");
                continue;
            };
            self.store
                .mark_failed(refusal.id, *revision, &refusal.reason)
                .await?;
            rejected += 1;
        }

        let report = SyncReport {
            pushed: request.orders.len(),
            accepted: accepted.len(),
            rejected,
        };
        tracing::info!(
            pushed = report.pushed,
            accepted = report.accepted,
            rejected = report.rejected,
            "sync finished"
        );
        Ok(report)
    }

    /// Download the catalog and replace the cached copy.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotActivated` without a stored license, and the
    /// client or store error otherwise.
    pub async fn refresh_catalog(&self) -> Result<(), SyncError> {
        let token = self.token(Utc::now()).await?;
        let snapshot = self.client.fetch_catalog(&token).await?;
        self.store.replace_catalog(&snapshot).await?;
        Ok(())
    }

    /// Run [`sync_once`](Self::sync_once) every `interval` until `shutdown`
    /// resolves. Failures are logged and retried on the next tick.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("sync loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.sync_once().await {
                        Ok(_) => {}
                        Err(SyncError::Client(e)) if e.is_transport() => {
                            tracing::debug!(error = %e, "server unreachable, staying offline");
                        }
                        Err(e) => tracing::warn!(error = %e, "sync failed"),
                    }
                }
            }
        }
    }
}

/// Activate this terminal: validate the key with the server and store the
/// returned token.
///
/// # Errors
///
/// Returns `SyncError::Client` with the server's refusal reason (e.g.
/// `device_limit_reached`), or `SyncError::Refused` if the server answered
/// without a token.
#[instrument(skip(store, client, key, fingerprint))]
pub async fn activate(
    store: &LocalStore,
    client: &SyncClient,
    key: &str,
    fingerprint: &str,
    device_name: Option<&str>,
) -> Result<Option<LicenseSummary>, SyncError> {
    let (_, summary) = validate_and_store(store, client, key, fingerprint, device_name).await?;
    tracing::info!("terminal activated");
    Ok(summary)
}

async fn validate_and_store(
    store: &LocalStore,
    client: &SyncClient,
    key: &str,
    fingerprint: &str,
    device_name: Option<&str>,
) -> Result<(String, Option<LicenseSummary>), SyncError> {
    let response = client
        .validate_license(&LicenseValidationRequest {
            key: key.trim().to_string(),
            fingerprint: fingerprint.to_string(),
            device_name: device_name.map(String::from),
        })
        .await?;

    let token = match (response.valid, response.token) {
        (true, Some(token)) => token,
        _ => {
            return Err(SyncError::Refused(
                response.reason.unwrap_or_else(|| "no token issued".to_string()),
            ));
        }
    };

    store.save_license(key.trim(), fingerprint, &token).await?;
    Ok((token, response.license))
}

/// Whether `token` expires within [`RENEW_BEFORE_DAYS`] of `now`.
///
/// Reads `exp` without checking the signature: this only decides when to
/// ask the server for a new token. [`crate::LicenseGate`] does the real
/// verification. Tokens that cannot be read are left alone.
fn renewal_due(token: &str, now: DateTime<Utc>) -> bool {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<LicenseClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| DateTime::from_timestamp(data.claims.exp, 0))
        .is_some_and(|exp| exp - now <= TimeDelta::days(RENEW_BEFORE_DAYS))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use tableside_core::{ProductId, SyncStatus};

    use super::*;
    use crate::store::{NewLocalItem, NewLocalOrder};
    use crate::test_support::{signed_token, snapshot};

    async fn activated_store() -> LocalStore {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.replace_catalog(&snapshot()).await.unwrap();
        store.save_license("ABCD-EFGH-JKLM-NPQR", "fp", "tok").await.unwrap();
        store
    }

    fn one_espresso() -> NewLocalOrder {
        NewLocalOrder {
            items: vec![NewLocalItem {
                product_id: ProductId::new(1),
                quantity: 1,
                notes: None,
            }],
            ..NewLocalOrder::default()
        }
    }

    #[tokio::test]
    async fn test_not_activated() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let sync = Synchronizer::new(store, SyncClient::new("http://127.0.0.1:9").unwrap());
        assert!(matches!(sync.sync_once().await, Err(SyncError::NotActivated)));
    }

    #[tokio::test]
    async fn test_nothing_pending_makes_no_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(500);
            })
            .await;

        let sync = Synchronizer::new(
            activated_store().await,
            SyncClient::new(&server.base_url()).unwrap(),
        );
        assert_eq!(sync.sync_once().await.unwrap(), SyncReport::default());
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_marks_accepted_and_rejected() {
        let store = activated_store().await;
        let good = store.record_order(&one_espresso()).await.unwrap();
        let bad = store.record_order(&one_espresso()).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/sync/orders")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(json!({
                    "accepted": [good.id],
                    "rejected": [{ "id": bad.id, "reason": "table 4 not found" }]
                }));
            })
            .await;

        let sync = Synchronizer::new(store.clone(), SyncClient::new(&server.base_url()).unwrap());
        let report = sync.sync_once().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                pushed: 2,
                accepted: 1,
                rejected: 1
            }
        );

        let good = store.get_order(good.id).await.unwrap().unwrap();
        assert_eq!(good.sync_status, SyncStatus::Synced);
        let bad = store.get_order(bad.id).await.unwrap().unwrap();
        assert_eq!(bad.sync_status, SyncStatus::SyncFailed);
        assert_eq!(bad.sync_error.as_deref(), Some("table 4 not found"));
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_orders_pending() {
        let store = activated_store().await;
        store.record_order(&one_espresso()).await.unwrap();

        // Nothing listens on the discard port.
        let sync = Synchronizer::new(store.clone(), SyncClient::new("http://127.0.0.1:9").unwrap());
        let err = sync.sync_once().await.unwrap_err();
        assert!(matches!(err, SyncError::Client(ref e) if e.is_transport()));
        assert_eq!(store.pending_orders(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_leaves_orders_pending() {
        let store = activated_store().await;
        store.record_order(&one_espresso()).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(403).json_body(json!({ "error": "license is suspended" }));
            })
            .await;

        let sync = Synchronizer::new(store.clone(), SyncClient::new(&server.base_url()).unwrap());
        assert!(sync.sync_once().await.is_err());
        assert_eq!(store.sync_counts().await.unwrap().pending, 1);
    }

    async fn mock_renewal<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/license/validate")
                    .json_body_partial(r#"{"key":"ABCD-EFGH-JKLM-NPQR","fingerprint":"fp"}"#);
                then.status(200)
                    .json_body(json!({ "valid": true, "token": token, "license": null }));
            })
            .await
    }

    #[test]
    fn test_renewal_due() {
        let now = Utc::now();
        assert!(renewal_due(&signed_token(now + TimeDelta::days(2)), now));
        assert!(renewal_due(&signed_token(now - TimeDelta::days(1)), now));
        assert!(!renewal_due(&signed_token(now + TimeDelta::days(20)), now));
        assert!(!renewal_due("not-a-jwt", now));
    }

    #[tokio::test]
    async fn test_renews_token_close_to_expiry() {
        let store = activated_store().await;
        let expiring = signed_token(Utc::now() + TimeDelta::days(2));
        store.save_license("ABCD-EFGH-JKLM-NPQR", "fp", &expiring).await.unwrap();
        store.record_order(&one_espresso()).await.unwrap();

        let server = MockServer::start_async().await;
        let renewal = mock_renewal(&server, "fresh").await;
        let push = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/sync/orders")
                    .header("authorization", "Bearer fresh");
                then.status(200).json_body(json!({ "accepted": [], "rejected": [] }));
            })
            .await;

        let sync = Synchronizer::new(store.clone(), SyncClient::new(&server.base_url()).unwrap());
        sync.sync_once().await.unwrap();

        renewal.assert_async().await;
        push.assert_async().await;
        assert_eq!(store.license().await.unwrap().unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn test_current_token_is_not_renewed() {
        let store = activated_store().await;
        let current = signed_token(Utc::now() + TimeDelta::days(20));
        store.save_license("ABCD-EFGH-JKLM-NPQR", "fp", &current).await.unwrap();
        store.record_order(&one_espresso()).await.unwrap();

        let server = MockServer::start_async().await;
        let renewal = mock_renewal(&server, "fresh").await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(200).json_body(json!({ "accepted": [], "rejected": [] }));
            })
            .await;

        let sync = Synchronizer::new(store.clone(), SyncClient::new(&server.base_url()).unwrap());
        sync.sync_once().await.unwrap();

        renewal.assert_hits_async(0).await;
        assert_eq!(store.license().await.unwrap().unwrap().token, current);
    }

    #[tokio::test]
    async fn test_unauthorized_push_renews_and_retries() {
        let store = activated_store().await;
        let order = store.record_order(&one_espresso()).await.unwrap();

        let server = MockServer::start_async().await;
        let renewal = mock_renewal(&server, "fresh").await;
        let stale = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/sync/orders")
                    .header("authorization", "Bearer tok");
                then.status(401)
                    .json_body(json!({ "error": "invalid license token: ExpiredSignature" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/sync/orders")
                    .header("authorization", "Bearer fresh");
                then.status(200)
                    .json_body(json!({ "accepted": [order.id], "rejected": [] }));
            })
            .await;

        let sync = Synchronizer::new(store.clone(), SyncClient::new(&server.base_url()).unwrap());
        let report = sync.sync_once().await.unwrap();

        assert_eq!(report.accepted, 1);
        stale.assert_async().await;
        renewal.assert_async().await;
        assert_eq!(store.sync_counts().await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_revoked_license_is_not_retried() {
        let store = activated_store().await;
        store.record_order(&one_espresso()).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(401)
                    .json_body(json!({ "error": "invalid license token: unknown license" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/license/validate");
                then.status(403).json_body(json!({ "valid": false, "reason": "license_revoked" }));
            })
            .await;

        let sync = Synchronizer::new(store.clone(), SyncClient::new(&server.base_url()).unwrap());
        let err = sync.sync_once().await.unwrap_err();

        assert!(matches!(err, SyncError::Client(ClientError::Status { status: 403, .. })));
        assert_eq!(store.license().await.unwrap().unwrap().token, "tok");
        assert_eq!(store.sync_counts().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = LocalStore::open_in_memory().await.unwrap();
        let sync = Synchronizer::new(store, SyncClient::new("http://127.0.0.1:9").unwrap());
        tokio::time::timeout(
            Duration::from_secs(5),
            sync.run(Duration::from_millis(10), tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_activate_stores_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/license/validate")
                    .json_body_partial(r#"{"key":"ABCD-EFGH-JKLM-NPQR","fingerprint":"fp-9"}"#);
                then.status(200).json_body(json!({
                    "valid": true,
                    "token": "signed",
                    "license": {
                        "license_id": 1,
                        "store_id": 7,
                        "plan": "pro",
                        "expires_at": null,
                        "max_devices": 3,
                        "active_devices": 1
                    }
                }));
            })
            .await;

        let store = LocalStore::open_in_memory().await.unwrap();
        let client = SyncClient::new(&server.base_url()).unwrap();
        let summary = activate(&store, &client, " ABCD-EFGH-JKLM-NPQR ", "fp-9", Some("Till 1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.max_devices, 3);
        let saved = store.license().await.unwrap().unwrap();
        assert_eq!(saved.token, "signed");
        assert_eq!(saved.key, "ABCD-EFGH-JKLM-NPQR");
    }

    #[tokio::test]
    async fn test_activate_refused() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/license/validate");
                then.status(403)
                    .json_body(json!({ "valid": false, "reason": "device_limit_reached" }));
            })
            .await;

        let store = LocalStore::open_in_memory().await.unwrap();
        let client = SyncClient::new(&server.base_url()).unwrap();
        let err = activate(&store, &client, "ABCD-EFGH-JKLM-NPQR", "fp", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Client(ClientError::Status { status: 403, ref message }) if message == "device_limit_reached"
        ));
        assert!(store.license().await.unwrap().is_none());
    }
}
