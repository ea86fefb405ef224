//! Stage timing metrics
//!
//! Lightweight collection of stage durations with statistical summaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Keep at most this many measurements; the oldest half is dropped beyond it.
const MAX_MEASUREMENTS: usize = 10_000;

/// Individual performance measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMeasurement {
    pub operation: String,
    pub duration_ms: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: Option<Uuid>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Statistical summary of performance measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub operation: String,
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

/// Thread-safe metrics collector
pub struct MetricsCollector {
    measurements: Arc<Mutex<Vec<PerformanceMeasurement>>>,
    enabled: bool,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(Vec::new())),
            enabled,
        }
    }

    pub fn record(&self, operation: &str, duration: Duration, correlation_id: Option<Uuid>) {
        self.record_with_metadata(operation, duration, correlation_id, HashMap::new());
    }

    pub fn record_with_metadata(
        &self,
        operation: &str,
        duration: Duration,
        correlation_id: Option<Uuid>,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        if !self.enabled {
            return;
        }

        let measurement = PerformanceMeasurement {
            operation: operation.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: chrono::Utc::now(),
            correlation_id,
            metadata,
        };

        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.push(measurement);

            if measurements.len() > MAX_MEASUREMENTS {
                measurements.drain(0..MAX_MEASUREMENTS / 2);
            }
        }
    }

    /// Get all measurements for a specific operation
    pub fn get_measurements(&self, operation: &str) -> Vec<PerformanceMeasurement> {
        self.filtered(|m| m.operation == operation)
    }

    /// Get measurements by correlation ID
    pub fn get_measurements_by_correlation(&self, correlation_id: Uuid) -> Vec<PerformanceMeasurement> {
        self.filtered(|m| m.correlation_id == Some(correlation_id))
    }

    fn filtered(&self, keep: impl Fn(&PerformanceMeasurement) -> bool) -> Vec<PerformanceMeasurement> {
        match self.measurements.lock() {
            Ok(measurements) => measurements.iter().filter(|m| keep(m)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Calculate performance statistics for an operation
    pub fn calculate_stats(&self, operation: &str) -> Option<PerformanceStats> {
        let mut durations: Vec<f64> = self
            .get_measurements(operation)
            .iter()
            .map(|m| m.duration_ms)
            .collect();
        if durations.is_empty() {
            return None;
        }
        durations.sort_by(|a, b| a.total_cmp(b));

        let count = durations.len();
        let mean = durations.iter().sum::<f64>() / count as f64;
        let variance = durations
            .iter()
            .map(|d| (d - mean) * (d - mean))
            .sum::<f64>()
            / count as f64;

        let median = if count % 2 == 0 {
            (durations[count / 2 - 1] + durations[count / 2]) / 2.0
        } else {
            durations[count / 2]
        };
        let p95_index = ((count as f64) * 0.95) as usize;

        Some(PerformanceStats {
            operation: operation.to_string(),
            count,
            mean_ms: mean,
            median_ms: median,
            std_dev_ms: variance.sqrt(),
            min_ms: durations[0],
            max_ms: durations[count - 1],
            p95_ms: durations[p95_index.min(count - 1)],
        })
    }

    pub fn clear(&self) {
        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.clear();
        }
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Measurements of one run as pretty JSON.
    pub fn export_run_json(&self, correlation_id: Uuid) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.get_measurements_by_correlation(correlation_id))
    }
}

/// Timer that records into a collector when stopped
pub struct Timer<'a> {
    start: Instant,
    operation: String,
    correlation_id: Option<Uuid>,
    collector: Option<&'a MetricsCollector>,
    metadata: HashMap<String, serde_json::Value>,
}

impl<'a> Timer<'a> {
    pub fn start(operation: &str, correlation_id: Option<Uuid>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            correlation_id,
            collector: None,
            metadata: HashMap::new(),
        }
    }

    pub fn start_with_collector(
        operation: &str,
        correlation_id: Option<Uuid>,
        collector: &'a MetricsCollector,
    ) -> Self {
        Self {
            collector: Some(collector),
            ..Self::start(operation, correlation_id)
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Stop the timer and record the measurement
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();

        if let Some(collector) = self.collector {
            collector.record_with_metadata(
                &self.operation,
                duration,
                self.correlation_id,
                self.metadata,
            );
        }

        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_secs_f64() * 1000.0,
            correlation_id = ?self.correlation_id,
            "Timer completed"
        );

        duration
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_METRICS: MetricsCollector = MetricsCollector::new(true);
}

/// Get the global metrics collector
pub fn global_metrics() -> &'static MetricsCollector {
    &GLOBAL_METRICS
}
