//! Layered configuration loading.
//!
//! Layers apply in order: built-in defaults, then a TOML or JSON file, then
//! environment variables named `PREFIX__SECTION__KEY`.

use crate::schema::{split_list, TokenStoreKind};
use crate::{ConfigError, GatewayConfig};
use portico_telemetry::LogFormat;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Default environment prefix.
pub const DEFAULT_ENV_PREFIX: &str = "PORTICO";

/// Builds a [`GatewayConfig`] from layered sources.
///
/// # Example
///
/// ```no_run
/// use portico_config::ConfigLoader;
///
/// # fn main() -> Result<(), portico_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_file("gateway.toml")?
///     .with_env_prefix("PORTICO")
///     .load()?;
/// println!("listening on {}", config.bind_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader holding the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration with the contents of `path`.
    ///
    /// The format is chosen by extension (`.toml` or `.json`).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse(&content, &format)
            .map_err(|e| match e {
                ConfigError::UnsupportedFormat(_) => {
                    ConfigError::UnsupportedFormat(path.display().to_string())
                }
                other => other,
            })?;

        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Replaces the configuration with `content` in the given format.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Reads environment overrides with `prefix` at [`load`](Self::load).
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        self
    }

    /// Applies overrides from explicit `(name, value)` pairs.
    pub fn with_env_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = prefix.to_uppercase();
        for (key, value) in vars {
            self.apply_env_var(key.as_ref(), value.as_ref(), &prefix)?;
        }
        Ok(self)
    }

    /// Applies environment overrides and validates.
    pub fn load(self) -> Result<GatewayConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<GatewayConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars().collect();
            self = self.with_env_vars(&prefix, vars)?;
        }
        Ok(self.config)
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
        else {
            return Ok(());
        };
        let parts: Vec<&str> = rest.split("__").collect();
        let c = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HOST"] => c.server.host = value.to_string(),
            ["SERVER", "PORT"] => c.server.port = parse_value(key, value, "expected port number")?,
            ["SERVER", "MAX_BODY_SIZE"] => {
                c.server.max_body_size = parse_value(key, value, "expected integer")?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                c.server.request_timeout_ms = parse_value(key, value, "expected integer")?;
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                c.server.shutdown_timeout_secs = parse_value(key, value, "expected integer")?;
            }

            ["GATEWAY", "HOST"] => c.gateway.host = value.to_string(),
            ["GATEWAY", "SERVICE_SUFFIX"] => c.gateway.service_suffix = value.to_string(),
            ["GATEWAY", "CONCEAL_FORBIDDEN"] => {
                c.gateway.conceal_forbidden = parse_bool(key, value)?;
            }

            ["SERVICES", "NAMES"] => c.services.names = split_list(value),

            ["AUTHORITY", "ADMIN"] => c.authority.admin = split_list(value),
            ["AUTHORITY", "SELLER"] => c.authority.seller = split_list(value),
            ["AUTHORITY", "MEMBER"] => c.authority.member = split_list(value),

            ["AUTH", "JWT_SECRET"] => c.auth.jwt_secret = value.to_string(),
            ["AUTH", "ISSUER"] => c.auth.issuer = non_empty(value),
            ["AUTH", "AUDIENCE"] => c.auth.audience = non_empty(value),
            ["AUTH", "ROLES_CLAIM"] => c.auth.roles_claim = value.to_string(),
            ["AUTH", "LEEWAY_SECS"] => {
                c.auth.leeway_secs = parse_value(key, value, "expected integer")?;
            }

            ["TOKEN_STORE", "KIND"] => {
                c.token_store.kind = match value.to_lowercase().as_str() {
                    "none" => TokenStoreKind::None,
                    "memory" => TokenStoreKind::Memory,
                    "redis" => TokenStoreKind::Redis,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'none', 'memory' or 'redis'",
                        ))
                    }
                };
            }
            ["TOKEN_STORE", "HOST"] => c.token_store.host = value.to_string(),
            ["TOKEN_STORE", "PORT"] => {
                c.token_store.port = parse_value(key, value, "expected port number")?;
            }
            ["TOKEN_STORE", "KEY_PREFIX"] => c.token_store.key_prefix = value.to_string(),

            ["UPSTREAM", "CONNECT_TIMEOUT_MS"] => {
                c.upstream.connect_timeout_ms = parse_value(key, value, "expected integer")?;
            }
            ["UPSTREAM", "MAX_RESPONSE_BYTES"] => {
                c.upstream.max_response_bytes = parse_value(key, value, "expected integer")?;
            }
            ["UPSTREAM", "SERVICES", name] => {
                c.upstream
                    .services
                    .insert(name.to_lowercase(), split_list(value));
            }

            ["DOCS", "PUBLIC"] => c.docs.public = parse_bool(key, value)?,
            ["DOCS", "MAX_DOCUMENT_BYTES"] => {
                c.docs.max_document_bytes = parse_value(key, value, "expected integer")?;
            }

            ["LOGGING", "LEVEL"] => c.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                c.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'"))
                    }
                };
            }

            ["METRICS", "ENABLED"] => c.metrics.enabled = parse_bool(key, value)?,

            _ => tracing::debug!(var = key, "ignoring unrecognized configuration variable"),
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<GatewayConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, expected))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
