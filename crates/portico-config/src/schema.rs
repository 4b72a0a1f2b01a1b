//! Configuration sections.
//!
//! Every field has a default, so a file only needs the keys it changes.
//! List-valued keys accept either an array or a single comma-separated
//! string:
//!
//! ```toml
//! [services]
//! names = "orders-service, users-service"
//!
//! [authority]
//! admin = ["ROLE_ADMIN"]
//! ```

use portico_telemetry::LogFormat;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

const MIB: usize = 1024 * 1024;

/// Deserializes an array of strings or a comma-separated string.
pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Csv(s) => split_list(&s),
    })
}

/// Splits a comma-separated value, dropping blanks.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,
    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Time allowed for in-flight requests at shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 10 * MIB,
            request_timeout_ms: 30_000,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Route table settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySection {
    /// Externally visible base address, e.g. `https://api.example.com`.
    pub host: String,
    /// Suffix stripped from service ids to form base names.
    pub service_suffix: String,
    /// Render authorization failures as 404.
    pub conceal_forbidden: bool,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            host: String::new(),
            service_suffix: "-service".to_string(),
            conceal_forbidden: false,
        }
    }
}

/// Backend service list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesConfig {
    /// Service names in registration order.
    #[serde(deserialize_with = "string_list")]
    pub names: Vec<String>,
}

/// Role strings for each role group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorityConfig {
    /// Roles accepted on admin routes.
    #[serde(deserialize_with = "string_list")]
    pub admin: Vec<String>,
    /// Roles accepted on seller routes.
    #[serde(deserialize_with = "string_list")]
    pub seller: Vec<String>,
    /// Roles accepted on member routes.
    #[serde(deserialize_with = "string_list")]
    pub member: Vec<String>,
}

/// Bearer token verification.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 shared secret.
    pub jwt_secret: String,
    /// Required `iss` claim.
    pub issuer: Option<String>,
    /// Required `aud` claim.
    pub audience: Option<String>,
    /// Claim holding the caller's roles.
    pub roles_claim: String,
    /// Allowed clock skew in seconds.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("roles_claim", &self.roles_claim)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: None,
            audience: None,
            roles_claim: "roles".to_string(),
            leeway_secs: 30,
        }
    }
}

/// Token-state store backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    /// No revocation checks.
    None,
    /// In-process store.
    #[default]
    Memory,
    /// Redis `EXISTS` lookups.
    Redis,
}

/// Token-state store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TokenStoreConfig {
    /// Backend.
    pub kind: TokenStoreKind,
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Prefix for revocation keys.
    pub key_prefix: String,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            kind: TokenStoreKind::Memory,
            host: "localhost".to_string(),
            port: 6379,
            key_prefix: "revoked:".to_string(),
        }
    }
}

/// Backend dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest backend response body the gateway will buffer. A larger
    /// body fails the request with 502.
    pub max_response_bytes: usize,
    /// Instance base URLs per service name.
    pub services: BTreeMap<String, Vec<String>>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            max_response_bytes: 32 * MIB,
            services: BTreeMap::new(),
        }
    }
}

/// Documentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DocsConfig {
    /// Serve per-service documents without authentication.
    pub public: bool,
    /// Largest document the gateway will rewrite.
    pub max_document_bytes: usize,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            public: false,
            max_document_bytes: 10 * MIB,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Converts to the telemetry crate's settings.
    pub fn to_log_config(&self) -> portico_telemetry::LogConfig {
        portico_telemetry::LogConfig {
            level: self.level.clone(),
            format: self.format,
            ..portico_telemetry::LogConfig::default()
        }
    }
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/_portico/metrics`.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
