//! Client identity derivation and baseline security response headers.
//!
//! # Responsibilities
//! - Derive the client IP from X-Forwarded-For / X-Real-IP / socket address
//! - Detect HTTPS via X-Forwarded-Proto
//! - Inject security response headers on every response
//!
//! # Design Decisions
//! - The gateway terminates plaintext behind a proxy, so forwarded headers
//!   are the only HTTPS signal available here
//! - HSTS is only sent when the request arrived over HTTPS; advertising it
//!   over plaintext could break a same-origin HTTP fallback
//! - The CSP is maximally restrictive: this surface serves JSON, never HTML

use std::net::IpAddr;

use axum::{
    body::Body,
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Derive the client IP for rate-limit keys and log context.
///
/// Preference order: first `X-Forwarded-For` entry, `X-Real-IP`, the raw
/// socket address, then the literal `"unknown"`. IPv6-mapped IPv4 addresses
/// are unwrapped so `::ffff:10.0.0.5` and `10.0.0.5` key the same bucket.
pub fn client_ip_from_headers(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let raw = forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    normalize_mapped_ipv4(&raw)
}

/// Unwrap `::ffff:a.b.c.d` to `a.b.c.d`; other values pass through.
fn normalize_mapped_ipv4(ip: &str) -> String {
    ip.strip_prefix("::ffff:")
        .filter(|rest| rest.parse::<std::net::Ipv4Addr>().is_ok())
        .map(str::to_string)
        .unwrap_or_else(|| ip.to_string())
}

/// Whether the original request arrived over HTTPS.
pub fn is_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

const BASELINE_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-dns-prefetch-control", "off"),
    (
        "permissions-policy",
        "camera=(), microphone=(), geolocation=(), payment=()",
    ),
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'; form-action 'none'",
    ),
];

/// Middleware adding the baseline security headers to every response.
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let https = is_https(request.headers());
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in BASELINE_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    if https {
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
