//! Structured logging.
//!
//! The gateway logs one JSON object per line by default. `RUST_LOG`, when
//! set, replaces the configured filter entirely.
//!
//! ```rust,ignore
//! use portico_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(route_id = "orders-admin-routes", "route matched");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// HTTP stack crates held at `warn` unless the level names them.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "redis"];

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, with the current span's fields.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives, e.g. `info` or `info,portico_filters=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Include the event's module path.
    pub include_target: bool,
    /// Include source file and line.
    pub file_line_info: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_target: true,
            file_line_info: false,
        }
    }
}

/// Returns the directives used when `RUST_LOG` is unset.
///
/// HTTP stack crates the level does not mention are capped at `warn`.
pub fn directives(level: &str) -> String {
    let level = level.trim();
    let mut directives = if level.is_empty() {
        "info".to_string()
    } else {
        level.to_string()
    };
    for target in QUIET_TARGETS {
        if !level.contains(target) {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    directives
}

/// Builds the filter: `RUST_LOG` if set, otherwise [`directives`] of `level`.
pub fn env_filter(level: &str) -> TelemetryResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(directives(level))
        .map_err(|e| TelemetryError::Logging(format!("invalid log level `{level}`: {e}")))
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = env_filter(&config.level)?;

    let fmt = tracing_subscriber::fmt::layer()
        .with_target(config.include_target)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt.json().with_current_span(true).with_span_list(false).boxed(),
        LogFormat::Pretty => fmt.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_http_stack_is_quieted_unless_named() {
        let d = directives("debug");
        assert!(d.starts_with("debug,"));
        assert!(d.contains("hyper=warn"));
        assert!(d.contains("reqwest=warn"));

        let d = directives("info,reqwest=trace");
        assert!(!d.contains("reqwest=warn"));
        assert!(d.contains("h2=warn"));

        assert!(directives("  ").starts_with("info,"));
    }

    #[test]
    fn test_filter_rejects_garbage() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(env_filter("info,portico_gateway=debug").is_ok());
            assert!(env_filter("portico_gateway=loud").is_err());
        }
    }
}
