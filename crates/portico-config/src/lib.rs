//! Typed configuration for the Portico gateway.
//!
//! Configuration is layered: built-in defaults, then a TOML or JSON file,
//! then environment variables.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8000
//! request_timeout_ms = 30000
//!
//! [gateway]
//! host = "https://api.example.com"
//! conceal_forbidden = false
//!
//! [services]
//! names = ["orders-service", "users-service"]
//!
//! [authority]
//! admin = ["ROLE_ADMIN"]
//! seller = ["ROLE_SELLER"]
//! member = ["ROLE_MEMBER"]
//!
//! [auth]
//! jwt_secret = "change-me"
//! issuer = "https://auth.example.com"
//!
//! [token_store]
//! kind = "redis"
//! host = "redis.internal"
//! port = 6379
//!
//! [upstream.services]
//! orders-service = ["http://10.0.0.5:8080", "http://10.0.0.6:8080"]
//!
//! [docs]
//! public = false
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Any key can be overridden as `PORTICO__SECTION__KEY`:
//!
//! - `PORTICO__SERVER__PORT=9000`
//! - `PORTICO__SERVICES__NAMES=orders-service,users-service`
//! - `PORTICO__UPSTREAM__SERVICES__ORDERS-SERVICE=http://10.0.0.5:8080`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;
mod watcher;

pub use config::GatewayConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    AuthConfig, AuthorityConfig, DocsConfig, GatewaySection, LoggingConfig, MetricsConfig,
    ServerConfig, ServicesConfig, TokenStoreConfig, TokenStoreKind, UpstreamConfig,
};
pub use watcher::{FileChangeEvent, FileChangeKind, FileWatcher, FileWatcherBuilder};
