//! Typed gateway errors.
//!
//! # Responsibilities
//! - Carry an HTTP status and a short machine-readable code per failure class
//! - Render the JSON error envelope `{error, message}` at the HTTP boundary
//!
//! # Design Decisions
//! - Security checks raise these instead of writing responses directly,
//!   keeping them unit-testable in isolation
//! - No stack traces or internal details in any response body

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures the security and observability layers can signal.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Browser-originated mutation from an Origin outside the allow-list.
    #[error("origin {origin} is not allowed")]
    ForbiddenOrigin { origin: String },

    /// Quota exceeded for the trailing window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Bad or missing metrics bearer token.
    #[error("unauthorized")]
    Unauthorized,
}

impl GatewayError {
    /// Short machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::ForbiddenOrigin { .. } => "forbidden_origin",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Unauthorized => "unauthorized",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ForbiddenOrigin { .. } => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        let mut response = (self.status(), body).into_response();

        if let GatewayError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
