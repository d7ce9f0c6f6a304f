//! HTTP server setup and middleware wiring.
//!
//! # Responsibilities
//! - Create the Axum router with the monitoring endpoints
//! - Wire up middleware: request ID, security headers, origin guard,
//!   rate limiting, request telemetry
//! - Bind the server to a listener and serve with graceful shutdown
//!
//! # Middleware order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → security headers → telemetry
//!     → origin guard → rate limit → handler
//! ```
//! Telemetry wraps the guards so rejected requests (403/429) are logged
//! and counted like any other response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::log_fields;
use crate::observability::logging::{LogLevel, RequestLogger, StructuredLogger};
use crate::observability::metrics::RequestMetricsBuffer;
use crate::observability::resource::{DependencyProbe, HttpProbe, ResourceMonitor};
use crate::security::headers::{client_ip_from_headers, security_headers_middleware};
use crate::security::origin::origin_guard;
use crate::security::rate_limit::{rate_limit_middleware, SlidingWindowLimiter};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub metrics: Arc<RequestMetricsBuffer>,
    pub monitor: Arc<ResourceMonitor>,
    pub logger: Arc<StructuredLogger>,
    pub probe: Option<Arc<dyn DependencyProbe>>,
}

impl AppState {
    /// Build state from config with the real clock and in-memory stores.
    pub fn from_config(config: GatewayConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_clock(config, clock)
    }

    /// Build state with an injected clock (tests drive time manually).
    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        let probe = config.health.probe_url.as_ref().map(|url| {
            Arc::new(HttpProbe::new(
                url.clone(),
                Duration::from_secs(config.health.probe_timeout_secs),
            )) as Arc<dyn DependencyProbe>
        });

        let logger = Arc::new(StructuredLogger::stdio(LogLevel::parse(
            &config.observability.log_level,
        )));

        Self {
            limiter: Arc::new(SlidingWindowLimiter::in_memory(clock.clone())),
            metrics: Arc::new(RequestMetricsBuffer::new(
                config.observability.metrics_capacity,
                clock,
            )),
            monitor: Arc::new(ResourceMonitor::new()),
            logger,
            probe,
            config: Arc::new(config),
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // periodic sweep of rate-limit buckets with no recent traffic
        let limiter = self.state.limiter.clone();
        let window_ms = self.state.config.rate_limit.window_secs * 1_000;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                limiter.prune_idle(window_ms);
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), origin_guard))
        .layer(middleware::from_fn_with_state(state.clone(), telemetry_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Times every request, then records the sample and emits the completion
/// log line with correlation context.
pub async fn telemetry_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let ip = client_ip_from_headers(request.headers(), Some(addr.ip()));
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request_logger = RequestLogger::new(state.logger.clone(), request_id);
    request_logger.set_context(log_fields! { "ip" => ip, "user_agent" => user_agent });
    request_logger.request_start(&method, &path);

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    state.metrics.record(duration_ms, status, &method, &path);
    request_logger.request_end(&method, &path, status, duration_ms);

    response
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
