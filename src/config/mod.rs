//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: CORS_ORIGIN, LOG_LEVEL, METRICS_TOKEN)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal (or absent) configs
//! - Environment variables win over file values

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{config_from_env, load_config, ConfigError};
pub use schema::{
    GatewayConfig, HealthConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    SecurityConfig,
};
