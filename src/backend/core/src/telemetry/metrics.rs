//! Prometheus metrics for the task scheduler.
//!
//! Metrics go through the `metrics` facade; with no recorder installed every
//! call is a no-op, so library users who do not call [`init_metrics`] pay
//! nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_core::telemetry::metrics::{init_metrics, MetricsConfig};
//!
//! let registry = init_metrics(&MetricsConfig::default(), "vigil-worker").unwrap();
//! println!("{}", registry.render());
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global metrics registry.
static METRICS_REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for task durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![
        0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0,
    ]
}

/// Handle to the installed Prometheus recorder.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// The registry installed by [`init_metrics`], or an empty one.
    pub fn global() -> &'static MetricsRegistry {
        METRICS_REGISTRY.get_or_init(MetricsRegistry::default)
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }
}

/// Install the Prometheus recorder and describe the scheduler metrics.
///
/// Fails if a global recorder is already installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::default());
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    let registry = MetricsRegistry {
        prometheus_handle: Some(handle),
    };
    let _ = METRICS_REGISTRY.set(registry.clone());

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(registry)
}

/// Register all metric descriptions.
fn register_metric_descriptions() {
    describe_counter!("vigil_tasks_submitted_total", "Tasks accepted by submit");
    describe_counter!(
        "vigil_tasks_settled_total",
        "Tasks that reached a terminal status, by outcome"
    );
    describe_counter!("vigil_tasks_retried_total", "Failed attempts that were requeued");
    describe_counter!("vigil_tasks_cancelled_total", "Tasks cancelled before being claimed");
    describe_counter!(
        "vigil_worker_internal_errors_total",
        "Worker loop iterations that failed outside user work"
    );
    describe_counter!("vigil_errors_total", "Scheduler errors by code and category");

    describe_histogram!(
        "vigil_task_duration_seconds",
        Unit::Seconds,
        "Duration of the settling attempt, by outcome"
    );

    describe_gauge!("vigil_queue_depth", "Entries waiting in the ordering store");
    describe_gauge!("vigil_tasks_running", "Tasks currently executing");
}

/// Task lifecycle metrics.
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    pub fn task_submitted() {
        counter!("vigil_tasks_submitted_total").increment(1);
    }

    /// Record a terminal outcome (`completed`, `failed`, `timed_out`) and
    /// the duration of the settling attempt.
    pub fn task_settled(outcome: &'static str, duration_ms: u64) {
        counter!("vigil_tasks_settled_total", "outcome" => outcome).increment(1);
        histogram!("vigil_task_duration_seconds", "outcome" => outcome)
            .record(duration_ms as f64 / 1000.0);
    }

    pub fn task_retried() {
        counter!("vigil_tasks_retried_total").increment(1);
    }

    pub fn task_cancelled() {
        counter!("vigil_tasks_cancelled_total").increment(1);
    }

    pub fn internal_error() {
        counter!("vigil_worker_internal_errors_total").increment(1);
    }

    pub fn set_queue_depth(depth: usize) {
        gauge!("vigil_queue_depth").set(depth as f64);
    }

    pub fn set_running(running: usize) {
        gauge!("vigil_tasks_running").set(running as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(!config.duration_buckets.is_empty());
        assert!(config.global_labels.is_empty());
    }

    #[test]
    fn test_disabled_metrics_render_empty() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };
        let registry = init_metrics(&config, "test").unwrap();
        assert!(!registry.is_enabled());
        assert_eq!(registry.render(), "");
    }

    #[test]
    fn test_scheduler_metrics_recorded() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            SchedulerMetrics::task_submitted();
            SchedulerMetrics::task_submitted();
            SchedulerMetrics::task_settled("completed", 1500);
            SchedulerMetrics::set_queue_depth(7);
        });

        let rendered = handle.render();
        assert!(rendered.contains("vigil_tasks_submitted_total 2"));
        assert!(rendered.contains("vigil_tasks_settled_total{outcome=\"completed\"} 1"));
        assert!(rendered.contains("vigil_queue_depth 7"));
    }
}
