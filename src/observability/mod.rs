//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every completed request:
//!     → logging.rs (one JSON record with correlation context)
//!     → metrics.rs (sample appended to the ring buffer)
//!
//! Readers:
//!     → GET /api/metrics (windowed snapshot over the ring)
//!     → GET /api/health  (resource.rs sample + classification)
//! ```
//!
//! # Design Decisions
//! - Structured JSON logging for machine parsing
//! - Request ID flows through all subsystems
//! - Recording is cheap and never fails a request
//! - All state lives in injected instances, never module globals

pub mod logging;
pub mod metrics;
pub mod resource;

pub use logging::{LogLevel, RequestLogger, StructuredLogger};
pub use metrics::{MetricsSnapshot, RequestMetricsBuffer};
pub use resource::{classify, HealthState, ResourceMonitor, ResourceSnapshot};
