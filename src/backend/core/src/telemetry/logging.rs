//! Structured logging with JSON/pretty/compact formats and sensitive data redaction.
//!
//! Work functions report failures as free text, and that text ends up in
//! warn-level logs. The redactor scrubs credentials out of it first: API keys,
//! bearer tokens, `password=...` style pairs, and passwords embedded in
//! connection URLs.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Global redactor instance for sensitive data.
static REDACTOR: OnceLock<SensitiveFieldRedactor> = OnceLock::new();

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty or compact)
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels, e.g. `vigil_core::tasks = "debug"`
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default = "default_include_location")]
    pub include_location: bool,

    /// Whether to include thread information
    #[serde(default)]
    pub include_thread: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,

    /// Log span close events (with their busy/idle timings)
    #[serde(default)]
    pub span_close_events: bool,

    /// Redaction configuration
    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: default_include_location(),
            include_thread: false,
            include_target: default_include_target(),
            span_close_events: false,
            redaction: RedactionConfig::default(),
        }
    }
}

impl LoggingConfig {
    fn fmt_span(&self) -> FmtSpan {
        if self.span_close_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Build the `EnvFilter` from the global level plus per-module overrides.
    pub fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)?;
        for (module, level) in &self.module_levels {
            let directive = format!("{}={}", module, level);
            filter = filter.add_directive(directive.parse()?);
        }
        Ok(filter)
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Configuration for sensitive data redaction.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionConfig {
    /// Whether redaction is enabled
    #[serde(default = "default_redaction_enabled")]
    pub enabled: bool,

    /// Patterns to redact
    #[serde(default = "default_redaction_patterns")]
    pub patterns: Vec<RedactionPattern>,

    /// Replacement text for redacted values
    #[serde(default = "default_redaction_replacement")]
    pub replacement: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: default_redaction_enabled(),
            patterns: default_redaction_patterns(),
            replacement: default_redaction_replacement(),
        }
    }
}

/// A pattern for identifying sensitive data to redact.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionPattern {
    /// Name of this pattern (for debugging)
    pub name: String,

    /// Field names to match (case-insensitive, substring)
    #[serde(default)]
    pub field_names: Vec<String>,

    /// Regex pattern to match in values
    #[serde(default)]
    pub value_pattern: Option<String>,
}

/// Redactor for sensitive fields and free-text values in log output.
#[derive(Debug, Clone)]
pub struct SensitiveFieldRedactor {
    patterns: Vec<CompiledRedactionPattern>,
    replacement: String,
    enabled: bool,
}

#[derive(Debug, Clone)]
struct CompiledRedactionPattern {
    field_names: Vec<String>,
    value_regex: Option<regex::Regex>,
}

impl SensitiveFieldRedactor {
    /// Create a new redactor from configuration.
    ///
    /// Patterns whose regex fails to compile are skipped with a warning.
    pub fn new(config: &RedactionConfig) -> Self {
        let patterns = config
            .patterns
            .iter()
            .map(|p| CompiledRedactionPattern {
                field_names: p.field_names.iter().map(|s| s.to_lowercase()).collect(),
                value_regex: p.value_pattern.as_ref().and_then(|pat| {
                    regex::Regex::new(pat)
                        .map_err(|e| {
                            tracing::warn!(pattern = %p.name, error = %e, "Invalid redaction pattern")
                        })
                        .ok()
                }),
            })
            .collect();

        Self {
            patterns,
            replacement: config.replacement.clone(),
            enabled: config.enabled,
        }
    }

    /// Check if a field name should be redacted.
    pub fn should_redact_field(&self, field_name: &str) -> bool {
        if !self.enabled {
            return false;
        }

        let lower = field_name.to_lowercase();
        self.patterns
            .iter()
            .any(|p| p.field_names.iter().any(|f| lower.contains(f)))
    }

    /// Redact every pattern match inside a value.
    pub fn redact_value(&self, value: &str) -> String {
        if !self.enabled {
            return value.to_string();
        }

        let mut result = value.to_string();
        for pattern in &self.patterns {
            if let Some(regex) = &pattern.value_regex {
                result = regex.replace_all(&result, self.replacement.as_str()).into_owned();
            }
        }
        result
    }

    /// Redact a field value, checking both field name and value patterns.
    pub fn redact(&self, field_name: &str, value: &str) -> String {
        if self.should_redact_field(field_name) {
            return self.replacement.clone();
        }

        self.redact_value(value)
    }

    /// Get the global redactor instance.
    pub fn global() -> &'static SensitiveFieldRedactor {
        REDACTOR.get_or_init(|| SensitiveFieldRedactor::new(&RedactionConfig::default()))
    }
}

// Default value functions
fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_include_location() -> bool {
    true
}

fn default_include_target() -> bool {
    true
}

fn default_redaction_enabled() -> bool {
    true
}

fn default_redaction_replacement() -> String {
    "[REDACTED]".to_string()
}

fn default_redaction_patterns() -> Vec<RedactionPattern> {
    vec![
        RedactionPattern {
            name: "api_keys".to_string(),
            field_names: vec!["api_key".to_string(), "apikey".to_string(), "x-api-key".to_string()],
            value_pattern: Some(r"sk-[a-zA-Z0-9]{20,}".to_string()),
        },
        RedactionPattern {
            name: "credential_pairs".to_string(),
            field_names: vec![
                "password".to_string(),
                "passwd".to_string(),
                "secret".to_string(),
                "credential".to_string(),
            ],
            value_pattern: Some(
                r"(?i)\b(?:password|passwd|secret|token|api_key)=[^\s&]+".to_string(),
            ),
        },
        RedactionPattern {
            name: "bearer_tokens".to_string(),
            field_names: vec![
                "token".to_string(),
                "bearer".to_string(),
                "authorization".to_string(),
            ],
            value_pattern: Some(r"(?i)bearer\s+[a-zA-Z0-9._~+/=-]+".to_string()),
        },
        RedactionPattern {
            name: "jwt".to_string(),
            field_names: vec!["jwt".to_string()],
            value_pattern: Some(r"eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+".to_string()),
        },
        RedactionPattern {
            name: "url_passwords".to_string(),
            field_names: vec!["dsn".to_string(), "database_url".to_string()],
            value_pattern: Some(r"[^\s:/@]+:[^\s@/]+@".to_string()),
        },
    ]
}

/// Initialize the logging subsystem.
///
/// In the `development` environment the JSON default is swapped for the
/// pretty format. Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, environment: &str) -> anyhow::Result<()> {
    let _ = REDACTOR.set(SensitiveFieldRedactor::new(&config.redaction));

    let filter = config.env_filter()?;

    let format = if environment == "development" && config.format == LogFormat::Json {
        &LogFormat::Pretty
    } else {
        &config.format
    };

    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(config.fmt_span())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_thread_names(config.include_thread)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_span_events(config.fmt_span())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_thread_names(config.include_thread)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_span_events(config.fmt_span())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread)
                .with_thread_names(config.include_thread)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redactor() -> SensitiveFieldRedactor {
        SensitiveFieldRedactor::new(&RedactionConfig::default())
    }

    #[test]
    fn test_field_names() {
        let redactor = redactor();
        assert!(redactor.should_redact_field("api_key"));
        assert!(redactor.should_redact_field("SMTP_PASSWORD"));
        assert!(redactor.should_redact_field("authorization"));
        assert!(!redactor.should_redact_field("task_name"));
        assert_eq!(redactor.redact("db_password", "hunter2"), "[REDACTED]");
    }

    #[test]
    fn test_error_message_redaction() {
        let redactor = redactor();

        assert_eq!(
            redactor.redact_value("webhook rejected: Authorization: Bearer abc.def-123"),
            "webhook rejected: Authorization: [REDACTED]"
        );
        assert_eq!(
            redactor.redact_value("connect failed: postgres://vigil:s3cret@db:5432/alerts"),
            "connect failed: postgres://[REDACTED]db:5432/alerts"
        );
        assert_eq!(
            redactor.redact_value("GET /notify?channel=ops&token=abcd1234 returned 401"),
            "GET /notify?channel=ops&[REDACTED] returned 401"
        );
        assert_eq!(redactor.redact_value("disk usage 91%"), "disk usage 91%");
    }

    #[test]
    fn test_disabled_redactor_passes_through() {
        let config = RedactionConfig {
            enabled: false,
            ..Default::default()
        };
        let redactor = SensitiveFieldRedactor::new(&config);
        assert_eq!(redactor.redact("password", "hunter2"), "hunter2");
    }

    #[test]
    fn test_invalid_pattern_skipped() {
        let config = RedactionConfig {
            patterns: vec![RedactionPattern {
                name: "broken".to_string(),
                field_names: vec![],
                value_pattern: Some("(".to_string()),
            }],
            ..Default::default()
        };
        let redactor = SensitiveFieldRedactor::new(&config);
        assert_eq!(redactor.redact_value("unchanged"), "unchanged");
    }

    #[test]
    fn test_env_filter_with_module_levels() {
        let mut config = LoggingConfig {
            level: "info".to_string(),
            ..Default::default()
        };
        config
            .module_levels
            .insert("vigil_core::tasks".to_string(), "debug".to_string());
        assert!(config.env_filter().is_ok());

        config.level = "vigil_core=loudest".to_string();
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.redaction.enabled);
        assert_eq!(config.fmt_span(), FmtSpan::NONE);
    }
}
