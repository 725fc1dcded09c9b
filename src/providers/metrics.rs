//! Per-instance request counters.
//!
//! Counters are plain atomics; a snapshot is consistent per counter but not
//! across counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters owned by one provider instance.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_processing_ms: AtomicU64,
    /// Documents or tokens processed, depending on the capability.
    total_units: AtomicU64,
}

impl ProviderMetrics {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful request over `units` items.
    pub fn record_success(&self, elapsed: Duration, units: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_processing_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.total_units.fetch_add(units, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_failure(&self, elapsed: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.total_processing_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Current values plus derived rates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_ms = self.total_processing_ms.load(Ordering::Relaxed);
        let units = self.total_units.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            total_processing_ms: total_ms,
            total_units: units,
            success_rate: if total == 0 {
                1.0
            } else {
                successful as f64 / total as f64
            },
            avg_processing_ms: if total == 0 {
                0.0
            } else {
                total_ms as f64 / total as f64
            },
            avg_units_per_request: if total == 0 {
                0.0
            } else {
                units as f64 / total as f64
            },
        }
    }
}

/// Point-in-time view of [`ProviderMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_processing_ms: u64,
    pub total_units: u64,
    pub success_rate: f64,
    pub avg_processing_ms: f64,
    pub avg_units_per_request: f64,
}
