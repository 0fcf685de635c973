//! Per-stage timing and memory reports.

use serde::Serialize;
use std::future::Future;
use tokio::time::Instant;
use tracing::Instrument;

use mediascribe_common::PerformanceConfig;
use mediascribe_platform::{process_memory_mb, DEFAULT_MEMORY_THRESHOLD_MB};

/// What one monitored stage cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub operation: String,
    pub duration_seconds: f64,
    /// Memory readings are `None` where the platform cannot report them.
    pub initial_memory_mb: Option<f64>,
    pub final_memory_mb: Option<f64>,
    pub peak_memory_mb: Option<f64>,
    pub memory_delta_mb: Option<f64>,
}

impl PerformanceReport {
    fn new(
        operation: &str,
        duration_seconds: f64,
        initial_memory_mb: Option<f64>,
        final_memory_mb: Option<f64>,
    ) -> Self {
        let peak_memory_mb = match (initial_memory_mb, final_memory_mb) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        Self {
            operation: operation.to_string(),
            duration_seconds,
            initial_memory_mb,
            final_memory_mb,
            peak_memory_mb,
            memory_delta_mb: initial_memory_mb.zip(final_memory_mb).map(|(a, b)| b - a),
        }
    }

    pub fn exceeds(&self, threshold_mb: f64) -> bool {
        self.peak_memory_mb.is_some_and(|peak| peak > threshold_mb)
    }
}

/// Wraps a stage in a `stage` span and reports its time and memory delta.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceMonitor {
    memory_threshold_mb: f64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_THRESHOLD_MB)
    }
}

impl PerformanceMonitor {
    pub fn new(memory_threshold_mb: f64) -> Self {
        Self {
            memory_threshold_mb,
        }
    }

    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self::new(config.memory_threshold_mb)
    }

    pub fn memory_threshold_mb(&self) -> f64 {
        self.memory_threshold_mb
    }

    /// Await `future` inside a `stage` span and report what it cost.
    pub async fn monitor_operation<T, Fut>(
        &self,
        operation: &str,
        future: Fut,
    ) -> (T, PerformanceReport)
    where
        Fut: Future<Output = T>,
    {
        let span = tracing::info_span!("stage", operation);
        let initial = process_memory_mb();
        let started = Instant::now();

        let value = future.instrument(span.clone()).await;

        let report = PerformanceReport::new(
            operation,
            started.elapsed().as_secs_f64(),
            initial,
            process_memory_mb(),
        );
        span.in_scope(|| self.log_report(&report));
        (value, report)
    }

    fn log_report(&self, report: &PerformanceReport) {
        tracing::info!(
            duration_secs = report.duration_seconds,
            memory_delta_mb = ?report.memory_delta_mb,
            peak_memory_mb = ?report.peak_memory_mb,
            "Stage finished"
        );
        if report.exceeds(self.memory_threshold_mb) {
            tracing::warn!(
                peak_memory_mb = ?report.peak_memory_mb,
                threshold_mb = self.memory_threshold_mb,
                "High memory usage detected"
            );
        }
    }
}
