//! Process and OS resource monitoring.
//!
//! # Responsibilities
//! - Sample CPU, memory, load averages, and process usage via sysinfo
//! - Classify a snapshot into healthy/warning/critical with alert strings
//! - Probe an external dependency for the deep health check
//!
//! # Design Decisions
//! - The monitor owns its sysinfo::System: CPU utilization comes from the
//!   delta between this instance's refreshes, so independent monitors (e.g.
//!   in tests) never interfere. The first sample after construction reads
//!   near zero, which is acceptable for a long-running service
//! - Classification is a pure function over the snapshot so thresholds are
//!   testable with synthetic inputs
//! - Each dimension has independent thresholds; overall severity is the
//!   maximum and is never downgraded by a healthy dimension
//! - The deep probe carries an explicit bounded timeout

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

/// Overall health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CpuMetrics {
    /// Whole-system CPU utilization as a fraction in [0, 1].
    pub utilization: f64,
    /// 1/5/15-minute load averages.
    pub load_avg: [f64; 3],
    pub cores: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    /// used / total as a fraction in [0, 1].
    pub utilization: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessMetrics {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
    /// This process's share of total memory, in [0, 1].
    pub memory_fraction: f64,
    pub uptime_secs: u64,
}

/// One point-in-time reading. Computed fresh on every health check.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceSnapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub process: ProcessMetrics,
    /// Connection-pool utilization, when a pool is wired in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_utilization: Option<f64>,
}

/// Classification result: overall state plus human-readable alerts.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub alerts: Vec<String>,
}

/// Classify a snapshot. Thresholds per dimension:
/// memory > 0.8 warning, > 0.9 critical; CPU > 0.7 warning, > 0.9 critical;
/// process memory fraction > 0.9 critical only; pool > 0.9 critical only.
pub fn classify(snapshot: &ResourceSnapshot) -> HealthReport {
    let mut status = HealthState::Healthy;
    let mut alerts = Vec::new();
    let mut raise = |state: HealthState, alert: String, status: &mut HealthState| {
        if state > *status {
            *status = state;
        }
        alerts.push(alert);
    };

    let memory = snapshot.memory.utilization;
    if memory > 0.9 {
        raise(
            HealthState::Critical,
            format!("memory utilization critical: {:.0}%", memory * 100.0),
            &mut status,
        );
    } else if memory > 0.8 {
        raise(
            HealthState::Warning,
            format!("memory utilization high: {:.0}%", memory * 100.0),
            &mut status,
        );
    }

    let cpu = snapshot.cpu.utilization;
    if cpu > 0.9 {
        raise(
            HealthState::Critical,
            format!("cpu utilization critical: {:.0}%", cpu * 100.0),
            &mut status,
        );
    } else if cpu > 0.7 {
        raise(
            HealthState::Warning,
            format!("cpu utilization high: {:.0}%", cpu * 100.0),
            &mut status,
        );
    }

    if snapshot.process.memory_fraction > 0.9 {
        raise(
            HealthState::Critical,
            format!(
                "process memory critical: {:.0}% of system",
                snapshot.process.memory_fraction * 100.0
            ),
            &mut status,
        );
    }

    if let Some(pool) = snapshot.pool_utilization {
        if pool > 0.9 {
            raise(
                HealthState::Critical,
                format!("connection pool near exhaustion: {:.0}%", pool * 100.0),
                &mut status,
            );
        }
    }

    HealthReport { status, alerts }
}

type PoolProvider = Box<dyn Fn() -> f64 + Send + Sync>;

/// Samples process/OS resources. Owns all the mutable sampling state.
pub struct ResourceMonitor {
    system: Mutex<System>,
    pool_provider: Option<PoolProvider>,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pool_provider: None,
        }
    }

    /// Wire in a connection-pool utilization reading.
    pub fn with_pool_provider(mut self, provider: PoolProvider) -> Self {
        self.pool_provider = Some(provider);
        self
    }

    /// Take a fresh reading. CPU utilization is the delta since this
    /// monitor's previous call.
    pub fn sample(&self) -> ResourceSnapshot {
        let mut system = self.system.lock().expect("resource monitor mutex poisoned");
        system.refresh_memory();
        system.refresh_cpu_usage();

        let pid = sysinfo::get_current_pid().ok();
        if let Some(pid) = pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }

        let total = system.total_memory();
        let used = system.used_memory();
        let free = system.free_memory();
        let memory = MemoryMetrics {
            total_bytes: total,
            used_bytes: used,
            free_bytes: free,
            utilization: if total > 0 {
                used as f64 / total as f64
            } else {
                0.0
            },
        };

        let load = System::load_average();
        let cpu = CpuMetrics {
            utilization: (system.global_cpu_usage() as f64 / 100.0).clamp(0.0, 1.0),
            load_avg: [load.one, load.five, load.fifteen],
            cores: system.cpus().len().max(1),
        };

        let process = pid
            .and_then(|pid| system.process(pid))
            .map(|proc| ProcessMetrics {
                rss_bytes: proc.memory(),
                virtual_bytes: proc.virtual_memory(),
                memory_fraction: if total > 0 {
                    proc.memory() as f64 / total as f64
                } else {
                    0.0
                },
                uptime_secs: proc.run_time(),
            })
            .unwrap_or(ProcessMetrics {
                rss_bytes: 0,
                virtual_bytes: 0,
                memory_fraction: 0.0,
                uptime_secs: 0,
            });

        ResourceSnapshot {
            cpu,
            memory,
            process,
            pool_utilization: self.pool_provider.as_ref().map(|p| p().clamp(0.0, 1.0)),
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-check failure.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Request(String),

    #[error("probe returned status {0}")]
    Status(u16),
}

/// A live dependency check: one lightweight query against an external
/// collaborator (the datastore).
#[async_trait::async_trait]
pub trait DependencyProbe: Send + Sync {
    async fn ping(&self) -> Result<(), ProbeError>;
}

/// HTTP GET probe with an explicit bounded timeout.
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { url, client }
    }
}

#[async_trait::async_trait]
impl DependencyProbe for HttpProbe {
    async fn ping(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(response.status().as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(memory: f64, cpu: f64, process_fraction: f64, pool: Option<f64>) -> ResourceSnapshot {
        ResourceSnapshot {
            cpu: CpuMetrics {
                utilization: cpu,
                load_avg: [0.1, 0.1, 0.1],
                cores: 4,
            },
            memory: MemoryMetrics {
                total_bytes: 1_000,
                used_bytes: (memory * 1_000.0) as u64,
                free_bytes: 1_000 - (memory * 1_000.0) as u64,
                utilization: memory,
            },
            process: ProcessMetrics {
                rss_bytes: (process_fraction * 1_000.0) as u64,
                virtual_bytes: 0,
                memory_fraction: process_fraction,
                uptime_secs: 60,
            },
            pool_utilization: pool,
        }
    }

    #[test]
    fn all_low_is_healthy_with_no_alerts() {
        let report = classify(&snapshot(0.5, 0.3, 0.1, Some(0.2)));
        assert_eq!(report.status, HealthState::Healthy);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn memory_095_is_critical() {
        let report = classify(&snapshot(0.95, 0.1, 0.1, None));
        assert_eq!(report.status, HealthState::Critical);
        assert!(report.alerts[0].contains("memory"));
    }

    #[test]
    fn memory_085_is_warning() {
        let report = classify(&snapshot(0.85, 0.1, 0.1, None));
        assert_eq!(report.status, HealthState::Warning);
    }

    #[test]
    fn cpu_thresholds() {
        assert_eq!(classify(&snapshot(0.1, 0.75, 0.1, None)).status, HealthState::Warning);
        assert_eq!(classify(&snapshot(0.1, 0.95, 0.1, None)).status, HealthState::Critical);
    }

    #[test]
    fn severity_is_never_downgraded() {
        // memory critical + cpu warning = critical, both alerts kept
        let report = classify(&snapshot(0.95, 0.75, 0.1, None));
        assert_eq!(report.status, HealthState::Critical);
        assert_eq!(report.alerts.len(), 2);
    }

    #[test]
    fn pool_and_process_are_critical_only() {
        assert_eq!(classify(&snapshot(0.1, 0.1, 0.95, None)).status, HealthState::Critical);
        assert_eq!(classify(&snapshot(0.1, 0.1, 0.1, Some(0.95))).status, HealthState::Critical);
        // below the critical line they contribute nothing
        assert_eq!(classify(&snapshot(0.1, 0.1, 0.85, Some(0.85))).status, HealthState::Healthy);
    }

    #[test]
    fn health_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&HealthState::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn monitor_samples_real_process() {
        let monitor = ResourceMonitor::new();
        let snapshot = monitor.sample();
        assert!(snapshot.memory.total_bytes > 0);
        assert!(snapshot.cpu.cores >= 1);
        assert!((0.0..=1.0).contains(&snapshot.memory.utilization));
    }
}
