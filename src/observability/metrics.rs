//! In-process request metrics.
//!
//! # Responsibilities
//! - Keep a fixed-capacity ring of recent request samples
//! - Produce windowed summaries: counts, status-class histogram, latency
//!   percentiles, per-route breakdown
//!
//! # Design Decisions
//! - Bounded ring over unbounded history: the service is long-running and
//!   single-process, so memory must not grow with traffic. The cap also
//!   bounds how far back a window can see; the snapshot exposes buffer
//!   occupancy so saturation is visible to operators
//! - Nearest-rank percentiles: deterministic, no interpolation, stable for
//!   the small per-route sample counts a 1000-slot ring produces
//! - Recording clamps malformed input instead of erroring: observability
//!   must never become a source of request failures

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::clock::Clock;

/// One request observation. Immutable once recorded.
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub timestamp_ms: u64,
    pub duration_ms: u64,
    pub status: u16,
    pub method: String,
    pub path: String,
}

/// Status-class histogram.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    #[serde(rename = "2xx")]
    pub s2xx: u64,
    #[serde(rename = "3xx")]
    pub s3xx: u64,
    #[serde(rename = "4xx")]
    pub s4xx: u64,
    #[serde(rename = "5xx")]
    pub s5xx: u64,
}

/// Latency summary in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct LatencySummary {
    pub avg: u64,
    pub p50: u64,
    pub p95: u64,
}

/// Summary over a set of samples (the whole window, or one route).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestSummary {
    pub count: u64,
    pub status: StatusCounts,
    pub latency_ms: LatencySummary,
}

/// Per-route summary row.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    #[serde(flatten)]
    pub summary: RequestSummary,
}

/// Ring occupancy, for judging how close the buffer is to capacity.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BufferInfo {
    pub max_samples: usize,
    pub current_samples: usize,
}

/// Full snapshot returned by `/api/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub generated_at: String,
    pub window_seconds: u64,
    pub totals: RequestSummary,
    pub by_route: Vec<RouteSummary>,
    pub buffer: BufferInfo,
}

/// Fixed-capacity ring of recent request samples.
pub struct RequestMetricsBuffer {
    samples: Mutex<VecDeque<RequestSample>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl RequestMetricsBuffer {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            clock,
        }
    }

    /// Record one observation, evicting the oldest samples beyond capacity.
    ///
    /// Out-of-range status codes are clamped into `[100, 599]` rather than
    /// rejected.
    pub fn record(&self, duration_ms: u64, status: u16, method: &str, path: &str) {
        let sample = RequestSample {
            timestamp_ms: self.clock.now_ms(),
            duration_ms,
            status: status.clamp(100, 599),
            method: method.to_string(),
            path: path.to_string(),
        };

        let mut samples = self.samples.lock().expect("metrics mutex poisoned");
        samples.push_back(sample);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Summarize samples with `timestamp >= now - window_secs`.
    pub fn snapshot(&self, window_secs: u64) -> MetricsSnapshot {
        let now = self.clock.now_ms();
        let window_start = now.saturating_sub(window_secs.saturating_mul(1_000));

        let samples = self.samples.lock().expect("metrics mutex poisoned");
        let current_samples = samples.len();

        let windowed: Vec<&RequestSample> = samples
            .iter()
            .filter(|s| s.timestamp_ms >= window_start)
            .collect();

        let totals = summarize(&windowed);

        let mut routes: HashMap<(String, String), Vec<&RequestSample>> = HashMap::new();
        for sample in &windowed {
            routes
                .entry((sample.method.clone(), sample.path.clone()))
                .or_default()
                .push(sample);
        }

        let mut by_route: Vec<RouteSummary> = routes
            .into_iter()
            .map(|((method, path), group)| RouteSummary {
                method,
                path,
                summary: summarize(&group),
            })
            .collect();
        by_route.sort_by(|a, b| {
            b.summary
                .count
                .cmp(&a.summary.count)
                .then_with(|| a.path.cmp(&b.path))
        });
        by_route.truncate(10);

        MetricsSnapshot {
            generated_at: chrono::Utc::now().to_rfc3339(),
            window_seconds: window_secs,
            totals,
            by_route,
            buffer: BufferInfo {
                max_samples: self.capacity,
                current_samples,
            },
        }
    }

    /// Clear all samples. Only used for test isolation.
    pub fn reset(&self) {
        self.samples.lock().expect("metrics mutex poisoned").clear();
    }
}

fn summarize(samples: &[&RequestSample]) -> RequestSummary {
    let count = samples.len() as u64;
    if count == 0 {
        return RequestSummary::default();
    }

    let mut status = StatusCounts::default();
    let mut durations: Vec<u64> = Vec::with_capacity(samples.len());
    let mut total: u64 = 0;

    for sample in samples {
        match sample.status {
            200..=299 => status.s2xx += 1,
            300..=399 => status.s3xx += 1,
            400..=499 => status.s4xx += 1,
            500..=599 => status.s5xx += 1,
            _ => {}
        }
        durations.push(sample.duration_ms);
        total += sample.duration_ms;
    }

    durations.sort_unstable();
    let latency_ms = LatencySummary {
        avg: ((total as f64) / (count as f64)).round() as u64,
        p50: nearest_rank(&durations, 50),
        p95: nearest_rank(&durations, 95),
    };

    RequestSummary {
        count,
        status,
        latency_ms,
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
///
/// `index = ceil(p/100 * n) - 1`, clamped to `[0, n-1]`.
fn nearest_rank(sorted: &[u64], percentile: u64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len() as u64;
    let rank = (percentile * n).div_ceil(100);
    let index = rank.saturating_sub(1).min(n - 1);
    sorted[index as usize]
}
