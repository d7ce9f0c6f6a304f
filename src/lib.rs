//! FlowATS Gateway — observability and resource-governance core.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 GATEWAY CORE                  │
//!                       │                                               │
//!   Client Request      │  ┌────────────┐   ┌──────────┐   ┌────────┐  │
//!   ────────────────────┼─▶│ request id │──▶│ security │──▶│  rate  │  │
//!                       │  │   layer    │   │  policy  │   │ limiter│  │
//!                       │  └────────────┘   └──────────┘   └───┬────┘  │
//!                       │                                      │       │
//!                       │                                      ▼       │
//!                       │                              business handler │
//!                       │                              (external)      │
//!   Client Response     │  ┌────────────┐   ┌──────────────────┐       │
//!   ◀───────────────────┼──│  security  │◀──│    telemetry     │◀──────┤
//!                       │  │  headers   │   │ (log + metrics)  │       │
//!                       │  └────────────┘   └──────────────────┘       │
//!                       │                                               │
//!                       │  Readers: GET /api/health   GET /api/metrics │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! Everything outside this core (CRUD routes, AI generation, auth) is an
//! external collaborator: it mounts these middleware and calls the
//! recording functions, nothing more.

// Core subsystems
pub mod clock;
pub mod config;
pub mod error;
pub mod http;

// Cross-cutting concerns
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::{AppState, HttpServer};
