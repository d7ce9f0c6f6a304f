//! HTTP subsystem: router, middleware wiring, and the monitoring endpoints.

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
