//! Configuration management.
//!
//! Sources are layered: an optional file (format inferred from its extension)
//! then `VIGIL__*` environment variables, e.g.
//! `VIGIL__SCHEDULER__MAX_WORKERS=8` or `VIGIL__SCHEDULER__POLL_INTERVAL=250ms`.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, VigilError};
use crate::tasks::SchedulerConfig;
use crate::telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "VIGIL";
const ENV_SEPARATOR: &str = "__";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging and metrics configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment())
            .build()?;

        Self::finish(config)
    }

    /// Load from a specific file path, with the environment layered on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(environment())
            .build()
            .map_err(|e| {
                VigilError::from(e).with_context("path", path.display().to_string())
            })?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> Result<Self> {
        let cfg: Config = config.try_deserialize()?;
        cfg.scheduler.validate()?;
        Ok(cfg)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR)
}
