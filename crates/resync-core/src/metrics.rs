//! Engine counters.
//!
//! [`EngineMetrics`] is a set of lock-free counters updated by the façade;
//! [`EngineMetrics::snapshot`] produces a serializable [`MetricsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::DrainReport;

/// Timing summary for directly executed operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationTimings {
    /// Total number of operations.
    pub count: u64,
    /// Number of successful operations.
    pub success_count: u64,
    /// Number of failed operations.
    pub failure_count: u64,
    /// Minimum operation duration.
    pub min_duration_ms: Option<u64>,
    /// Maximum operation duration.
    pub max_duration_ms: Option<u64>,
    /// Average operation duration.
    pub avg_duration_ms: Option<f64>,
}

/// Thread-safe atomic operation timing tracker.
#[derive(Debug)]
pub struct AtomicTimings {
    count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_duration_ms: AtomicU64,
    min_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
}

impl Default for AtomicTimings {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            min_duration_ms: AtomicU64::new(u64::MAX),
            max_duration_ms: AtomicU64::new(0),
        }
    }
}

impl AtomicTimings {
    /// Record one operation.
    pub fn record(&self, duration: Duration, success: bool) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_duration_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_duration_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_duration_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Get a snapshot of the current timings.
    pub fn snapshot(&self) -> OperationTimings {
        let count = self.count.load(Ordering::Relaxed);
        let total = self.total_duration_ms.load(Ordering::Relaxed);
        let min = self.min_duration_ms.load(Ordering::Relaxed);

        OperationTimings {
            count,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            min_duration_ms: (min != u64::MAX).then_some(min),
            max_duration_ms: (count > 0).then(|| self.max_duration_ms.load(Ordering::Relaxed)),
            avg_duration_ms: (count > 0).then(|| total as f64 / count as f64),
        }
    }
}

/// Counters for the resilience engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    drains: AtomicU64,
    actions_succeeded: AtomicU64,
    actions_failed: AtomicU64,
    actions_dropped: AtomicU64,
    actions_deferred: AtomicU64,
    /// Operations run immediately while online.
    pub direct: AtomicTimings,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Completed queue drains.
    pub drains: u64,
    /// Queued actions replayed successfully.
    pub actions_succeeded: u64,
    /// Failed replay attempts, including the ones that led to a drop.
    pub actions_failed: u64,
    /// Actions dropped after exhausting their retries.
    pub actions_dropped: u64,
    /// Actions queued instead of executed.
    pub actions_deferred: u64,
    /// Timings of direct executions.
    pub direct: OperationTimings,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a finished drain.
    pub fn record_drain(&self, report: &DrainReport) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.actions_succeeded
            .fetch_add(report.succeeded as u64, Ordering::Relaxed);
        self.actions_failed
            .fetch_add((report.requeued + report.dropped) as u64, Ordering::Relaxed);
        self.actions_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
    }

    /// Account for an action sent to the queue.
    pub fn record_deferred(&self) {
        self.actions_deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            drains: self.drains.load(Ordering::Relaxed),
            actions_succeeded: self.actions_succeeded.load(Ordering::Relaxed),
            actions_failed: self.actions_failed.load(Ordering::Relaxed),
            actions_dropped: self.actions_dropped.load(Ordering::Relaxed),
            actions_deferred: self.actions_deferred.load(Ordering::Relaxed),
            direct: self.direct.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_empty() {
        let timings = AtomicTimings::default().snapshot();
        assert_eq!(timings.count, 0);
        assert_eq!(timings.min_duration_ms, None);
        assert_eq!(timings.max_duration_ms, None);
        assert_eq!(timings.avg_duration_ms, None);
    }

    #[test]
    fn test_timings_min_max_avg() {
        let timings = AtomicTimings::default();
        timings.record(Duration::from_millis(10), true);
        timings.record(Duration::from_millis(30), false);

        let snap = timings.snapshot();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.success_count, 1);
        assert_eq!(snap.failure_count, 1);
        assert_eq!(snap.min_duration_ms, Some(10));
        assert_eq!(snap.max_duration_ms, Some(30));
        assert_eq!(snap.avg_duration_ms, Some(20.0));
    }

    #[test]
    fn test_record_drain() {
        let metrics = EngineMetrics::new();
        metrics.record_drain(&DrainReport {
            attempted: 4,
            succeeded: 2,
            requeued: 1,
            dropped: 1,
            ..Default::default()
        });
        metrics.record_deferred();

        let snap = metrics.snapshot();
        assert_eq!(snap.drains, 1);
        assert_eq!(snap.actions_succeeded, 2);
        assert_eq!(snap.actions_failed, 2);
        assert_eq!(snap.actions_dropped, 1);
        assert_eq!(snap.actions_deferred, 1);
    }
}
