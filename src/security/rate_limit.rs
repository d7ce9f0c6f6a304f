//! Sliding-window rate limiting middleware.
//!
//! # Responsibilities
//! - Answer "is this key over quota in the trailing window?" in bounded memory
//! - Normalize request paths into route groups so path parameters share a bucket
//! - Reject over-quota `/api/*` requests with 429 + Retry-After
//!
//! # Design Decisions
//! - True sliding window (per-hit timestamps), not fixed buckets: bursts are
//!   smoothed continuously instead of resetting at window boundaries
//! - Stale hits are pruned lazily on access; an optional sweep evicts buckets
//!   whose newest hit already left the window
//! - Bucket storage sits behind a small trait so the in-memory map can be
//!   swapped for a bounded or externally backed store without touching callers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::clock::Clock;
use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::security::headers::client_ip_from_headers;

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDecision {
    pub ok: bool,
    /// Seconds until the earliest surviving hit leaves the window. Only set
    /// on rejection, floored at 1.
    pub retry_after_secs: Option<u64>,
}

impl LimitDecision {
    fn accepted() -> Self {
        Self {
            ok: true,
            retry_after_secs: None,
        }
    }

    fn rejected(retry_after_secs: u64) -> Self {
        Self {
            ok: false,
            retry_after_secs: Some(retry_after_secs.max(1)),
        }
    }
}

/// Storage for per-key hit timestamps.
///
/// The in-memory implementation lives for the process lifetime; `prune`
/// exists so a periodic sweep can evict buckets with no recent traffic
/// instead of relying solely on lazy pruning at access time.
pub trait BucketStore: Send + Sync {
    /// Current hits for a key (empty if the key is unknown).
    fn load(&self, key: &str) -> Vec<u64>;

    /// Replace the hits for a key.
    fn store(&self, key: &str, hits: Vec<u64>);

    /// Drop every bucket whose newest hit is older than `horizon_ms`.
    fn prune(&self, horizon_ms: u64);

    /// Number of live buckets, for operational visibility.
    fn len(&self) -> usize;
}

/// Process-local bucket map.
#[derive(Default)]
pub struct InMemoryBuckets {
    buckets: Mutex<HashMap<String, Vec<u64>>>,
}

impl BucketStore for InMemoryBuckets {
    fn load(&self, key: &str) -> Vec<u64> {
        let buckets = self.buckets.lock().expect("bucket mutex poisoned");
        buckets.get(key).cloned().unwrap_or_default()
    }

    fn store(&self, key: &str, hits: Vec<u64>) {
        let mut buckets = self.buckets.lock().expect("bucket mutex poisoned");
        buckets.insert(key.to_string(), hits);
    }

    fn prune(&self, horizon_ms: u64) {
        let mut buckets = self.buckets.lock().expect("bucket mutex poisoned");
        buckets.retain(|_, hits| hits.last().is_some_and(|&newest| newest > horizon_ms));
    }

    fn len(&self) -> usize {
        self.buckets.lock().expect("bucket mutex poisoned").len()
    }
}

/// Sliding-window limiter over a pluggable bucket store.
pub struct SlidingWindowLimiter {
    store: Box<dyn BucketStore>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Box<dyn BucketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Box::new(InMemoryBuckets::default()), clock)
    }

    /// Check whether `key` may take another hit under `max` hits per
    /// trailing `window_ms`.
    ///
    /// `max = 0` rejects every call. `window_ms = 0` prunes every prior hit
    /// (including same-millisecond ones), so any positive quota accepts.
    pub fn check(&self, key: &str, max: u64, window_ms: u64) -> LimitDecision {
        let now = self.clock.now_ms();
        let window_start = now.saturating_sub(window_ms);

        let mut hits = self.store.load(key);
        hits.retain(|&ts| ts > window_start);

        if hits.len() as u64 >= max {
            let retry_after_secs = hits
                .first()
                .map(|&earliest| {
                    let free_at = earliest + window_ms;
                    (free_at.saturating_sub(now)).div_ceil(1_000)
                })
                .unwrap_or(1);
            // store the pruned (not appended) bucket so rejected traffic
            // cannot extend its own penalty
            self.store.store(key, hits);
            return LimitDecision::rejected(retry_after_secs);
        }

        hits.push(now);
        self.store.store(key, hits);
        LimitDecision::accepted()
    }

    /// Evict buckets whose newest hit is already outside `window_ms`.
    pub fn prune_idle(&self, window_ms: u64) {
        let horizon = self.clock.now_ms().saturating_sub(window_ms);
        self.store.prune(horizon);
    }

    pub fn bucket_count(&self) -> usize {
        self.store.len()
    }
}

/// Normalize a path into its route group.
///
/// Paths differing only by an identifier segment share one quota bucket,
/// so `/api/jobs/42` and `/api/jobs/99` cannot blow up the key space.
pub fn route_group(path: &str) -> &str {
    const PREFIXES: &[(&str, &str)] = &[
        ("/api/generate/", "/api/generate/*"),
        ("/api/predictions", "/api/predictions/*"),
        ("/api/predict", "/api/predict/*"),
        ("/api/cover-letter/drafts", "/api/cover-letter/drafts"),
        ("/api/artifacts", "/api/artifacts"),
        ("/api/job-materials", "/api/job-materials"),
        ("/api/jobs", "/api/jobs/*"),
        ("/api/company", "/api/company/*"),
        ("/api/analytics", "/api/analytics/*"),
        ("/api/monitoring", "/api/monitoring/*"),
    ];

    for (prefix, group) in PREFIXES {
        if path.starts_with(prefix) {
            return group;
        }
    }
    path
}

/// Quota for a route group, from config.
fn quota_for(group: &str, config: &crate::config::RateLimitConfig) -> u64 {
    match group {
        "/api/generate/*" | "/api/predict/*" | "/api/predictions/*" => config.generation_max,
        "/api/monitoring/*" | "/api/metrics" => config.monitoring_max,
        _ => config.default_max,
    }
}

/// Middleware enforcing per-IP quotas on `/api/*` paths.
///
/// `/api/health` is exempt so load balancers are never throttled away from
/// the health check.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    let path = request.uri().path();
    let config = &state.config.rate_limit;

    if !config.enabled || !path.starts_with("/api/") || path == "/api/health" {
        return Ok(next.run(request).await);
    }

    let ip = client_ip_from_headers(request.headers(), Some(addr.ip()));
    let group = route_group(path);
    let key = format!("ip:{}:{}:{}", ip, request.method(), group);
    let max = quota_for(group, config);

    let decision = state
        .limiter
        .check(&key, max, config.window_secs * 1_000);

    if decision.ok {
        Ok(next.run(request).await)
    } else {
        let retry_after_secs = decision.retry_after_secs.unwrap_or(1);
        tracing::warn!(client = %ip, group = %group, retry_after_secs, "Rate limit exceeded");
        Err(GatewayError::RateLimited { retry_after_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(clock: Arc<ManualClock>) -> SlidingWindowLimiter {
        SlidingWindowLimiter::in_memory(clock)
    }

    #[test]
    fn accepts_up_to_max_then_rejects() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock.clone());

        for _ in 0..5 {
            assert!(limiter.check("k", 5, 60_000).ok);
        }
        let decision = limiter.check("k", 5, 60_000);
        assert!(!decision.ok);
        assert!(decision.retry_after_secs.unwrap() >= 1);
    }

    #[test]
    fn window_expiry_frees_quota() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock.clone());

        assert!(limiter.check("k", 1, 10_000).ok);
        assert!(!limiter.check("k", 1, 10_000).ok);

        clock.advance(10_001);
        assert!(limiter.check("k", 1, 10_000).ok);
    }

    #[test]
    fn keys_are_independent() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock);

        assert!(limiter.check("a", 1, 60_000).ok);
        assert!(!limiter.check("a", 1, 60_000).ok);
        assert!(limiter.check("b", 1, 60_000).ok);
    }

    #[test]
    fn retry_after_reflects_earliest_hit() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock.clone());

        assert!(limiter.check("k", 1, 30_000).ok);
        clock.advance(10_000);
        let decision = limiter.check("k", 1, 30_000);
        assert!(!decision.ok);
        // earliest hit frees up 20s from now
        assert_eq!(decision.retry_after_secs, Some(20));
    }

    #[test]
    fn max_zero_rejects_everything() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock);
        let decision = limiter.check("k", 0, 60_000);
        assert!(!decision.ok);
        assert_eq!(decision.retry_after_secs, Some(1));
    }

    #[test]
    fn rejection_does_not_extend_penalty() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock.clone());

        assert!(limiter.check("k", 1, 10_000).ok);
        // hammer while rejected; these must not count as hits
        for _ in 0..50 {
            clock.advance(100);
            assert!(!limiter.check("k", 1, 10_000).ok);
        }
        clock.advance(10_000);
        assert!(limiter.check("k", 1, 10_000).ok);
    }

    #[test]
    fn zero_window_never_accumulates_hits() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock);

        // prior hits never outlive a zero-width window, same millisecond
        // included, so a quota of 1 accepts every call
        for _ in 0..10 {
            assert!(limiter.check("k", 1, 0).ok);
        }
    }

    #[test]
    fn prune_idle_drops_cold_buckets() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = limiter(clock.clone());

        limiter.check("cold", 10, 5_000);
        limiter.check("warm", 10, 5_000);
        clock.advance(4_000);
        limiter.check("warm", 10, 5_000);
        clock.advance(2_000);

        limiter.prune_idle(5_000);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn route_groups_normalize_ids() {
        assert_eq!(route_group("/api/jobs/42"), "/api/jobs/*");
        assert_eq!(route_group("/api/jobs/99"), "/api/jobs/*");
        assert_eq!(route_group("/api/generate/resume"), "/api/generate/*");
        assert_eq!(route_group("/api/predictions/7"), "/api/predictions/*");
        assert_eq!(route_group("/api/monitoring/errors"), "/api/monitoring/*");
        assert_eq!(route_group("/api/profile"), "/api/profile");
    }

    #[test]
    fn quotas_follow_route_group() {
        let config = crate::config::RateLimitConfig::default();
        assert_eq!(quota_for("/api/generate/*", &config), 200);
        assert_eq!(quota_for("/api/metrics", &config), 120);
        assert_eq!(quota_for("/api/jobs/*", &config), 600);
    }
}
