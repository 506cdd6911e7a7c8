//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: JSON/pretty/compact output with sensitive data redaction
//! - **Metrics**: task lifecycle counters, queue and running gauges, durations
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_core::telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::default();
//! let handle = init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{
    init_logging, LogFormat, LoggingConfig, RedactionConfig, RedactionPattern,
    SensitiveFieldRedactor,
};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry, SchedulerMetrics};

use serde::Deserialize;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to logs and metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "vigil-worker".to_string()
}

fn default_environment() -> String {
    std::env::var("VIGIL_ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

/// Initialize logging and metrics.
///
/// Call once at startup; a second call fails because the global subscriber
/// and recorder are already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryHandle> {
    init_logging(&config.logging, &config.environment)?;
    let metrics = init_metrics(&config.metrics, &config.service_name)?;

    ::tracing::info!(
        service_name = %config.service_name,
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(TelemetryHandle { metrics })
}

/// Handle for the initialized telemetry stack.
#[derive(Debug)]
pub struct TelemetryHandle {
    /// Metrics handle for rendering the registry
    pub metrics: MetricsRegistry,
}

impl TelemetryHandle {
    /// Log the final metrics snapshot.
    pub fn shutdown(self) {
        if self.metrics.is_enabled() {
            ::tracing::debug!(metrics = %self.metrics.render(), "Final metrics snapshot");
        }
        ::tracing::info!("Telemetry shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "vigil-worker");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_telemetry_config_deserializes_partial() {
        let config: TelemetryConfig = serde_json::from_str(
            r#"{"service_name":"alerts","logging":{"format":"compact"},"metrics":{"enabled":false}}"#,
        )
        .unwrap();
        assert_eq!(config.service_name, "alerts");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(!config.metrics.enabled);
    }
}
