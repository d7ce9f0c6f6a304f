//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has a Default so a minimal (or absent) config file works.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin allow-list and header policy.
    pub security: SecurityConfig,

    /// Sliding-window rate limit quotas.
    pub rate_limit: RateLimitConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Health endpoint and deep-probe settings.
    pub health: HealthConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Origins allowed to issue mutating `/api/*` requests from a browser.
    /// Empty, or a single "*", means allow all.
    pub allowed_origins: Vec<String>,
}

/// Sliding-window rate limiting configuration.
///
/// Quotas are per `(ip, method, route group)` key over the trailing window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Trailing window length in seconds.
    pub window_secs: u64,

    /// Default quota per key per window.
    pub default_max: u64,

    /// Tightened quota for AI generation and prediction route groups.
    pub generation_max: u64,

    /// Tightened quota for monitoring/metrics route groups.
    pub monitoring_max: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 300,
            default_max: 600,
            generation_max: 200,
            monitoring_max: 120,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Minimum log level (debug, info, warn, error).
    pub log_level: String,

    /// Bearer token protecting `/api/metrics`.
    pub metrics_token: String,

    /// Ring buffer capacity for request samples.
    pub metrics_capacity: usize,

    /// Default snapshot window in seconds when the query omits `window`.
    pub metrics_window_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_token: String::new(),
            metrics_capacity: 1_000,
            metrics_window_secs: 300,
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// URL probed by `?deep=1`. None disables the deep check.
    pub probe_url: Option<String>,

    /// Deep probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Minimum body size before gzip is applied.
    pub gzip_min_bytes: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_timeout_secs: 2,
            gzip_min_bytes: 512,
        }
    }
}
