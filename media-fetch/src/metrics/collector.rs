//! Metrics collector implementation.
//!
//! Counters are updated once per finished request under a single lock that
//! is never held across I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Default)]
struct Counters {
    total_downloads: u64,
    successful_downloads: u64,
    failed_downloads: u64,
    total_bytes_served: u64,
    average_file_size_bytes: f64,
    failures_by_kind: BTreeMap<&'static str, u64>,
}

/// Metrics collector for the download service.
#[derive(Debug)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
    started_at: DateTime<Utc>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            started_at: Utc::now(),
        }
    }

    /// Record a download whose file was served in full.
    pub fn record_success(&self, bytes: u64) {
        let mut guard = self.counters.lock();
        let c = &mut *guard;
        c.total_downloads += 1;
        c.successful_downloads += 1;
        c.total_bytes_served = c.total_bytes_served.saturating_add(bytes);
        // running mean over successful downloads
        let n = c.successful_downloads as f64;
        c.average_file_size_bytes += (bytes as f64 - c.average_file_size_bytes) / n;
    }

    /// Record a failed download, labelled by error kind.
    pub fn record_failure(&self, kind: &'static str) {
        let mut guard = self.counters.lock();
        let c = &mut *guard;
        c.total_downloads += 1;
        c.failed_downloads += 1;
        *c.failures_by_kind.entry(kind).or_default() += 1;
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (total, ok, failed, bytes, avg, by_kind) = {
            let c = self.counters.lock();
            (
                c.total_downloads,
                c.successful_downloads,
                c.failed_downloads,
                c.total_bytes_served,
                c.average_file_size_bytes,
                c.failures_by_kind.clone(),
            )
        };

        let success_rate_percent = if total == 0 {
            0.0
        } else {
            ok as f64 / total as f64 * 100.0
        };
        let uptime = Utc::now() - self.started_at;

        MetricsSnapshot {
            total_downloads: total,
            successful_downloads: ok,
            failed_downloads: failed,
            success_rate_percent,
            total_bytes_served: bytes,
            average_file_size_bytes: avg.round() as u64,
            average_file_size_mb: avg / MIB,
            failures_by_kind: by_kind
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            uptime_start: self.started_at,
            uptime_hours: uptime.num_seconds().max(0) as f64 / 3600.0,
        }
    }
}

/// Snapshot of all metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_downloads: u64,
    pub successful_downloads: u64,
    pub failed_downloads: u64,
    pub success_rate_percent: f64,
    pub total_bytes_served: u64,
    pub average_file_size_bytes: u64,
    pub average_file_size_mb: f64,
    pub failures_by_kind: BTreeMap<String, u64>,
    pub uptime_start: DateTime<Utc>,
    pub uptime_hours: f64,
}
