//! Token bucket rate limiting middleware.
//!
//! The buckets live in the shared [`RateLimiterRegistry`]; these layers only
//! derive the client key and translate a refusal into HTTP 429.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use keygate_auth::Scope;
use keygate_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the limiter key for a request.
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
/// With `trusted` set, the headers count only when the peer is in the list.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted: Option<&[IpAddr]>,
) -> String {
    let peer_ip = peer.map(|addr| addr.ip());
    let honor_headers = match trusted {
        None => true,
        Some(proxies) => peer_ip.is_some_and(|ip| proxies.contains(&ip)),
    };

    if honor_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

async fn limit(state: &AppState, scope: Scope, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(
        request.headers(),
        peer,
        state.config.rate_limit.trusted_proxies.as_deref(),
    );

    if !state.limiter.allow(scope, &key).await {
        tracing::warn!(scope = %scope, client = %key, path = %request.uri().path(), "Request rate limited");
        return ApiError(AppError::rate_limited("too many requests, slow down"))
            .into_response();
    }

    next.run(request).await
}

/// Applied to every `/api` route.
pub async fn api_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    limit(&state, Scope::Api, request, next).await
}

/// Applied to requests outside `/api`.
pub async fn web_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    limit(&state, Scope::Web, request, next).await
}

/// Applied to login and registration. Always on.
pub async fn critical_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    limit(&state, Scope::Critical, request, next).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_wins() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        let peer = "127.0.0.1:4000".parse().ok();
        assert_eq!(client_key(&map, peer, None), "203.0.113.7");
    }

    #[test]
    fn real_ip_then_peer_then_unknown() {
        let map = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&map, None, None), "198.51.100.2");

        let peer = "192.0.2.9:5555".parse().ok();
        assert_eq!(client_key(&HeaderMap::new(), peer, None), "192.0.2.9");
        assert_eq!(client_key(&HeaderMap::new(), None, None), "unknown");
    }

    #[test]
    fn untrusted_peer_cannot_pick_its_key() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let trusted = [proxy];
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.2"),
        ]);

        let stranger = "192.0.2.9:5555".parse().ok();
        assert_eq!(client_key(&map, stranger, Some(&trusted[..])), "192.0.2.9");
        assert_eq!(client_key(&map, None, Some(&trusted[..])), "unknown");

        let via_proxy = "10.0.0.1:443".parse().ok();
        assert_eq!(client_key(&map, via_proxy, Some(&trusted[..])), "203.0.113.7");

        let real_only = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_key(&real_only, via_proxy, Some(&trusted[..])), "198.51.100.2");
        assert_eq!(client_key(&HeaderMap::new(), via_proxy, Some(&trusted[..])), "10.0.0.1");
    }
}
