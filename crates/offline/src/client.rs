//! HTTP client for the server's terminal endpoints.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use tableside_core::{
    CatalogSnapshot, LicenseValidationRequest, LicenseValidationResponse, SyncPushRequest,
    SyncPushResponse,
};

use crate::error::ClientError;

/// Per-request timeout; terminals must fall back to offline mode quickly.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for `/api/license/validate` and `/api/sync/*`.
#[derive(Debug, Clone)]
pub struct SyncClient {
    client: Client,
    base_url: Url,
}

impl SyncClient {
    /// Create a client for the server at `base_url` (e.g. `https://pos.example.com`).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` for a malformed or non-HTTP URL.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme {}",
                base_url.scheme()
            )));
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    /// Exchange a license key and device fingerprint for a signed token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Status` with the refusal reason (e.g. `revoked`)
    /// when the server turns the key down.
    #[instrument(skip(self, request), fields(device = ?request.device_name))]
    pub async fn validate_license(
        &self,
        request: &LicenseValidationRequest,
    ) -> Result<LicenseValidationResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint("/api/license/validate")?)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    /// Download the store's catalog.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-success status.
    #[instrument(skip(self, token))]
    pub async fn fetch_catalog(&self, token: &str) -> Result<CatalogSnapshot, ClientError> {
        let response = self
            .client
            .get(self.endpoint("/api/sync/catalog")?)
            .bearer_auth(token)
            .send()
            .await?;
        let snapshot: CatalogSnapshot = decode(response).await?;
        debug!(
            products = snapshot.products.len(),
            tables = snapshot.tables.len(),
            "catalog fetched"
        );
        Ok(snapshot)
    }

    /// Push a batch of orders.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure or a non-success status.
    #[instrument(skip(self, token, request), fields(orders = request.orders.len()))]
    pub async fn push_orders(
        &self,
        token: &str,
        request: &SyncPushRequest,
    ) -> Result<SyncPushResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint("/api/sync/orders")?)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}

/// Decode a success body, or turn an error status into `ClientError::Status`
/// carrying the server's `error` (or license `reason`) message.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        }),
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("reason"))
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use tableside_core::{OrderId, StoreId};

    use super::*;

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(SyncClient::new("not a url"), Err(ClientError::InvalidUrl(_))));
        assert!(matches!(
            SyncClient::new("ftp://pos.example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(SyncClient::new("https://pos.example.com").is_ok());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"error":"Not found"}"#).as_deref(), Some("Not found"));
        assert_eq!(
            error_message(r#"{"valid":false,"reason":"revoked"}"#).as_deref(),
            Some("revoked")
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[tokio::test]
    async fn test_fetch_catalog_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/sync/catalog")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(json!({
                    "store_id": 3,
                    "currency": "EUR",
                    "tax_rate": "0.2",
                    "products": [],
                    "tables": []
                }));
            })
            .await;

        let client = SyncClient::new(&server.base_url()).unwrap();
        let snapshot = client.fetch_catalog("tok").await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.store_id, StoreId::new(3));
        assert_eq!(snapshot.currency, "EUR");
    }

    #[tokio::test]
    async fn test_error_status_carries_server_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(403)
                    .json_body(json!({ "error": "license is suspended" }));
            })
            .await;

        let client = SyncClient::new(&server.base_url()).unwrap();
        let err = client
            .push_orders("tok", &SyncPushRequest { orders: vec![] })
            .await
            .unwrap_err();

        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "license is suspended");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_orders_decodes_response() {
        let server = MockServer::start_async().await;
        let accepted = OrderId::generate();
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/sync/orders");
                then.status(200)
                    .json_body(json!({ "accepted": [accepted], "rejected": [] }));
            })
            .await;

        let client = SyncClient::new(&server.base_url()).unwrap();
        let response = client
            .push_orders("tok", &SyncPushRequest { orders: vec![] })
            .await
            .unwrap();
        assert_eq!(response.accepted, vec![accepted]);
    }
}
