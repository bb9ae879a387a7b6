//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the middleware.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable selecting the minimum log severity.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Environment variable carrying the application name printed on every log line.
pub const ENV_APP_NAME: &str = "APP_NAME";
/// Environment variable carrying the default segment name.
pub const ENV_SEGMENT_NAME: &str = "XRAY_NAME";
/// Environment variable carrying the trace header name.
pub const ENV_TRACE_HEADER: &str = "XRAY_TRACE";

/// Root configuration for the logging and tracing middleware.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Log line formatting and verbosity.
    pub logging: LoggingConfig,

    /// Trace segment handling.
    pub tracing: TracingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Verbosity: `DEBUG`, `TRACE`, anything else means informational.
    pub level: String,

    /// Application name written on every log line.
    pub app_name: String,

    /// chrono pattern for the leading timestamp.
    pub timestamp_format: String,

    /// Digit grouping separator for elapsed milliseconds.
    pub thousands_separator: char,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            app_name: String::new(),
            timestamp_format: "%d/%m/%Y %H:%M:%S,%3f".to_string(),
            thousands_separator: '.',
        }
    }
}

impl LoggingConfig {
    /// Minimum enabled severity. Matching is case-sensitive.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.as_str() {
            "DEBUG" => LevelFilter::DEBUG,
            "TRACE" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}

/// Trace segment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Header carrying the inbound trace context and the propagated response value.
    pub header_name: String,

    /// Segment name used when no dynamic naming applies.
    pub default_segment_name: String,

    /// Buffer response bodies and attach them as `response` metadata.
    pub capture_response_body: bool,

    /// Optional host based segment naming.
    pub dynamic_naming: Option<DynamicNamingConfig>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            header_name: "X-Amzn-Trace-Id".to_string(),
            default_segment_name: "service".to_string(),
            capture_response_body: true,
            dynamic_naming: None,
        }
    }
}

/// Host pattern naming: hosts matching `pattern` name their own segment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DynamicNamingConfig {
    /// Name used when the host does not match.
    pub fallback: String,

    /// Wildcard pattern (`*` any run, `?` any single character).
    pub pattern: String,
}

impl MiddlewareConfig {
    /// Read the whole configuration from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Override fields with values from `lookup` (usually the environment).
    ///
    /// Taking the lookup as a closure keeps this testable without touching
    /// process-wide state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(app_name) = lookup(ENV_APP_NAME) {
            self.logging.app_name = app_name;
        }
        if let Some(name) = lookup(ENV_SEGMENT_NAME) {
            self.tracing.default_segment_name = name;
        }
        if let Some(header) = lookup(ENV_TRACE_HEADER) {
            self.tracing.header_name = header;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_level_filter_mapping() {
        let mut cfg = LoggingConfig::default();
        assert_eq!(cfg.level_filter(), LevelFilter::INFO);

        cfg.level = "DEBUG".into();
        assert_eq!(cfg.level_filter(), LevelFilter::DEBUG);

        cfg.level = "TRACE".into();
        assert_eq!(cfg.level_filter(), LevelFilter::TRACE);

        // Only the exact upper-case names are recognized
        cfg.level = "debug".into();
        assert_eq!(cfg.level_filter(), LevelFilter::INFO);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOG_LEVEL", "DEBUG"),
            ("APP_NAME", "billing"),
            ("XRAY_NAME", "billing-api"),
            ("XRAY_TRACE", "X-Trace"),
        ]
        .into_iter()
        .collect();

        let mut config = MiddlewareConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.logging.level, "DEBUG");
        assert_eq!(config.logging.app_name, "billing");
        assert_eq!(config.tracing.default_segment_name, "billing-api");
        assert_eq!(config.tracing.header_name, "X-Trace");
    }

    #[test]
    fn test_missing_env_keeps_defaults() {
        let mut config = MiddlewareConfig::default();
        config.apply_env_overrides(|_| None);
        assert_eq!(config.tracing.header_name, "X-Amzn-Trace-Id");
        assert!(config.tracing.capture_response_body);
    }
}
