//! Origin enforcement for browser-driven mutations.
//!
//! # Responsibilities
//! - Block cross-site browser mutations on `/api/*` from disallowed Origins
//! - Leave non-browser clients (no Origin header) and reads untouched
//!
//! # Design Decisions
//! - This is CSRF-style defense, not authentication: a missing Origin header
//!   never blocks, since CLIs and server-to-server callers do not send one
//! - An empty allow-list, or one containing "*", allows every origin

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::error::GatewayError;
use crate::http::server::AppState;

/// Decide whether a request passes the origin policy.
///
/// Pure function over method, path, and the optional Origin header value,
/// so the matrix of cases is unit-testable without HTTP plumbing.
pub fn check_origin(
    method: &Method,
    path: &str,
    origin: Option<&str>,
    allowed: &[String],
) -> Result<(), GatewayError> {
    let mutating = matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    if !mutating || !path.starts_with("/api/") {
        return Ok(());
    }

    let Some(origin) = origin else {
        return Ok(());
    };

    let allow_all = allowed.is_empty() || allowed.iter().any(|o| o == "*");
    if allow_all || allowed.iter().any(|o| o == origin) {
        Ok(())
    } else {
        Err(GatewayError::ForbiddenOrigin {
            origin: origin.to_string(),
        })
    }
}

/// Middleware applying [`check_origin`] against the configured allow-list.
pub async fn origin_guard(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let origin = request
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    check_origin(
        request.method(),
        request.uri().path(),
        origin.as_deref(),
        &state.config.security.allowed_origins,
    )
    .inspect_err(|_| {
        tracing::warn!(
            origin = origin.as_deref().unwrap_or("-"),
            method = %request.method(),
            path = request.uri().path(),
            "Blocked mutation from disallowed origin"
        );
    })?;

    Ok(next.run(request).await)
}
