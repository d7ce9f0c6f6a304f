//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, capacities > 0)
//! - Check the deep-probe URL parses when set
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::GatewayConfig;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {problem}")]
pub struct ValidationError {
    pub field: String,
    pub problem: String,
}

impl ValidationError {
    fn new(field: &str, problem: &str) -> Self {
        Self {
            field: field.to_string(),
            problem: problem.to_string(),
        }
    }
}

/// Validate the full configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a valid socket address",
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.window_secs",
                "must be greater than zero",
            ));
        }
        for (field, value) in [
            ("rate_limit.default_max", config.rate_limit.default_max),
            ("rate_limit.generation_max", config.rate_limit.generation_max),
            ("rate_limit.monitoring_max", config.rate_limit.monitoring_max),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(field, "must be greater than zero"));
            }
        }
    }

    if config.observability.metrics_capacity == 0 {
        errors.push(ValidationError::new(
            "observability.metrics_capacity",
            "must be greater than zero",
        ));
    }
    if config.observability.metrics_window_secs == 0 {
        errors.push(ValidationError::new(
            "observability.metrics_window_secs",
            "must be greater than zero",
        ));
    }

    match config.observability.log_level.as_str() {
        "debug" | "info" | "warn" | "error" => {}
        other => errors.push(ValidationError::new(
            "observability.log_level",
            &format!("unknown level '{other}'"),
        )),
    }

    if let Some(url) = &config.health.probe_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "health.probe_url",
                "must be an http(s) URL",
            ));
        }
        if config.health.probe_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "health.probe_timeout_secs",
                "must be greater than zero",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
