//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (derive client IP, detect HTTPS)
//!     → origin.rs (block cross-site browser mutations)
//!     → rate_limit.rs (check per-IP sliding-window quotas)
//!     → Pass to handlers
//!
//! Outgoing response:
//!     → headers.rs (inject baseline security headers)
//! ```
//!
//! # Design Decisions
//! - Checks raise typed errors; the HTTP layer renders them
//! - Fail closed on any security check failure
//! - No trust in client input beyond the first proxy hop

pub mod headers;
pub mod origin;
pub mod rate_limit;

pub use headers::{client_ip_from_headers, is_https};
pub use origin::check_origin;
pub use rate_limit::{route_group, BucketStore, InMemoryBuckets, LimitDecision, SlidingWindowLimiter};
