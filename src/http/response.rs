//! Response construction for the monitoring endpoints.
//!
//! # Responsibilities
//! - Serialize JSON payloads with caching disabled
//! - Gzip bodies at or above a size threshold when the client accepts it
//!
//! # Design Decisions
//! - Health/metrics payloads reflect live state, so `Cache-Control: no-store`
//!   and `Vary: Accept-Encoding` are always set
//! - Fastest gzip level: these bodies are small and latency matters more
//!   than ratio

use std::io::Write;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use flate2::{write::GzEncoder, Compression};

/// Whether the Accept-Encoding header admits gzip.
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding.is_some_and(|value| {
        value
            .split(',')
            .map(str::trim)
            .any(|token| token == "gzip" || token.starts_with("gzip;"))
    })
}

/// Build a JSON response, gzip-compressed when the body reaches
/// `gzip_min_bytes` and the caller accepts gzip.
pub fn monitoring_json(
    status: StatusCode,
    body: Vec<u8>,
    accept_encoding: Option<&str>,
    gzip_min_bytes: usize,
) -> Response {
    let compress = body.len() >= gzip_min_bytes && accepts_gzip(accept_encoding);

    let body = if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        // encoding into a Vec cannot fail; fall back to identity if it does
        match encoder.write_all(&body).and_then(|_| encoder.finish()) {
            Ok(compressed) => compressed,
            Err(_) => body,
        }
    } else {
        body
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
        .header(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    if compress {
        builder = builder.header(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }

    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_token_detection() {
        assert!(accepts_gzip(Some("gzip, deflate, br")));
        assert!(accepts_gzip(Some("deflate, gzip;q=0.8")));
        assert!(!accepts_gzip(Some("deflate, br")));
        assert!(!accepts_gzip(None));
    }

    #[test]
    fn small_bodies_are_not_compressed() {
        let response = monitoring_json(StatusCode::OK, b"{}".to_vec(), Some("gzip"), 512);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
        assert_eq!(response.headers().get(header::VARY).unwrap(), "Accept-Encoding");
    }

    #[test]
    fn large_bodies_are_gzipped_when_accepted() {
        let body = vec![b'x'; 2_048];
        let response = monitoring_json(StatusCode::OK, body.clone(), Some("gzip"), 512);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );

        let without = monitoring_json(StatusCode::OK, body, None, 512);
        assert!(without.headers().get(header::CONTENT_ENCODING).is_none());
    }
}
