//! Per-client request throttling.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::ratelimit::{RateLimitInfo, RateLimiter};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Serialize)]
struct ThrottledBody {
    error: &'static str,
    message: String,
    retry_after: u64,
}

/// Admit or reject a request based on its client's quota.
///
/// Every response, admitted or not, carries the client's quota headers.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_identifier(&request);

    let allowed = rate_limiter.check_rate_limit(&client);
    let info = rate_limiter.get_info(&client);

    let mut response = if allowed {
        next.run(request).await
    } else {
        warn!(
            client = %client,
            method = %request.method(),
            uri = %request.uri(),
            limit = info.limit,
            "Request throttled"
        );
        throttled_response(&info)
    };

    insert_rate_limit_headers(response.headers_mut(), &info);
    response
}

/// Identify the client by the IP of the transport peer.
///
/// Forwarding headers are ignored since any client can set them.
pub fn client_identifier(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn throttled_response(info: &RateLimitInfo) -> Response {
    let retry_after = info.retry_after_secs();
    let body = ThrottledBody {
        error: "rate_limit_exceeded",
        message: format!(
            "Rate limit of {} requests exceeded, retry in {} seconds",
            info.limit, retry_after
        ),
        retry_after,
    };

    (
        StatusCode::TOO_MANY_REQUESTS,
        [(RETRY_AFTER, HeaderValue::from(retry_after))],
        Json(body),
    )
        .into_response()
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset_unix_secs()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_identifier_uses_peer_ip() {
        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 51234))));

        assert_eq!(client_identifier(&request), "192.0.2.10");
    }

    #[test]
    fn test_client_identifier_ignores_forwarded_headers() {
        let mut request = Request::new(Body::empty());
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("10.1.1.1"));
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 443))));

        assert_eq!(client_identifier(&request), "192.0.2.10");
    }

    #[test]
    fn test_client_identifier_fallback() {
        let request = Request::new(Body::empty());
        assert_eq!(client_identifier(&request), "unknown");
    }

    #[tokio::test]
    async fn test_rate_limit_headers() {
        let rate_limiter = RateLimiter::new(10, std::time::Duration::from_secs(60)).unwrap();
        rate_limiter.check_rate_limit("client");
        let info = rate_limiter.get_info("client");

        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, &info);

        assert_eq!(headers["x-ratelimit-limit"], "10");
        assert_eq!(headers["x-ratelimit-remaining"], "9");
        let reset: i64 = headers["x-ratelimit-reset"].to_str().unwrap().parse().unwrap();
        assert!((reset - info.reset_unix_secs()).abs() <= 1);
    }
}
