//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `login_rate_limiter`: staff password login
//! - `license_rate_limiter`: the public license validation endpoint
//!
//! Both allow ~10 requests per minute per client IP with a burst of 5.
//! Clients are keyed on the socket peer unless the server runs behind a
//! trusted reverse proxy (`POS_TRUST_PROXY`); otherwise any caller could
//! pick a fresh `X-Forwarded-For` per request.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Key extractor for the client IP, see [`client_ip`].
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy: bool,
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        client_ip(req, self.trust_proxy).ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Client IP of a request.
///
/// With `trust_proxy`, `X-Forwarded-For` (first hop) and then `X-Real-IP`
/// win over the socket peer. Without it only the peer counts.
pub fn client_ip<T>(req: &Request<T>, trust_proxy: bool) -> Option<IpAddr> {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(req) {
            return Some(ip);
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();

    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn strict_limiter(trust_proxy: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor { trust_proxy })
        .per_second(6) // Replenish 1 token every 6 seconds (~10/minute)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for staff login.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers, which are always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn login_rate_limiter(trust_proxy: bool) -> RateLimiterLayer {
    strict_limiter(trust_proxy)
}

/// Create rate limiter for terminal license validation.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers, which are always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn license_rate_limiter(trust_proxy: bool) -> RateLimiterLayer {
    strict_limiter(trust_proxy)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn proxied_request(peer: &str) -> Request<()> {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        let peer: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        req
    }

    #[test]
    fn test_headers_ignored_by_default() {
        let req = proxied_request("192.0.2.7:5555");
        assert_eq!(client_ip(&req, false), Some("192.0.2.7".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_header_wins_behind_proxy() {
        let req = proxied_request("10.0.0.1:5555");
        assert_eq!(client_ip(&req, true), Some("203.0.113.9".parse().unwrap()));

        let mut real_ip_only = proxied_request("10.0.0.1:5555");
        real_ip_only.headers_mut().remove("x-forwarded-for");
        assert_eq!(client_ip(&real_ip_only, true), Some("198.51.100.2".parse().unwrap()));
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "not-an-ip")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req, true), None);
        assert_eq!(client_ip(&req, false), None);

        let peer: SocketAddr = "192.0.2.7:5555".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&req, true), Some(peer.ip()));
    }
}
