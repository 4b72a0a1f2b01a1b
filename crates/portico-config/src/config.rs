//! The top-level [`GatewayConfig`].

use crate::schema::{
    AuthConfig, AuthorityConfig, DocsConfig, GatewaySection, LoggingConfig, MetricsConfig,
    ServerConfig, ServicesConfig, TokenStoreConfig, TokenStoreKind, UpstreamConfig,
};
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Listener.
    pub server: ServerConfig,
    /// Route table settings.
    pub gateway: GatewaySection,
    /// Backend services.
    pub services: ServicesConfig,
    /// Role groups.
    pub authority: AuthorityConfig,
    /// Token verification.
    pub auth: AuthConfig,
    /// Revocation store.
    pub token_store: TokenStoreConfig,
    /// Backend dispatch.
    pub upstream: UpstreamConfig,
    /// API documentation.
    pub docs: DocsConfig,
    /// Logging.
    pub logging: LoggingConfig,
    /// Metrics.
    pub metrics: MetricsConfig,
}

impl GatewayConfig {
    /// Checks values that parse but cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid_value("server.port", "must not be 0"));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than 0",
            ));
        }

        if self.services.names.is_empty() {
            return Err(ConfigError::invalid_value(
                "services.names",
                "at least one service is required",
            ));
        }

        let host = self.gateway.host.trim();
        if !(host.starts_with("http://") || host.starts_with("https://"))
            || host.trim_start_matches("http://").trim_start_matches("https://").is_empty()
        {
            return Err(ConfigError::invalid_value(
                "gateway.host",
                format!("expected an absolute http(s) URL, got '{}'", self.gateway.host),
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::invalid_value("auth.jwt_secret", "must be set"));
        }

        if self.token_store.kind == TokenStoreKind::Redis && self.token_store.host.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "token_store.host",
                "required when token_store.kind is 'redis'",
            ));
        }

        if self.upstream.max_response_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "upstream.max_response_bytes",
                "must be greater than 0",
            ));
        }

        if self.docs.max_document_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "docs.max_document_bytes",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Returns the listener address as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Returns `true` if the route table inputs differ.
    ///
    /// The route table is rebuilt from `gateway`, `services`, `authority`,
    /// `auth`, `token_store`, `upstream` and `docs`.
    pub fn routes_changed(&self, other: &Self) -> bool {
        self.gateway != other.gateway
            || self.services != other.services
            || self.authority != other.authority
            || self.auth != other.auth
            || self.token_store != other.token_store
            || self.upstream != other.upstream
            || self.docs != other.docs
    }

    /// Returns `true` if settings that only apply at startup differ.
    pub fn requires_restart(&self, other: &Self) -> bool {
        self.server != other.server || self.logging != other.logging || self.metrics != other.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.gateway.host = "https://api.example.com".to_string();
        config.services.names = vec!["orders-service".to_string()];
        config.auth.jwt_secret = "secret".to_string();
        config
    }

    fn invalid_field(config: &GatewayConfig) -> String {
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => field,
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
        assert_eq!(valid().bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_rejects_port_zero() {
        let mut config = valid();
        config.server.port = 0;
        assert_eq!(invalid_field(&config), "server.port");
    }

    #[test]
    fn test_rejects_empty_services() {
        let mut config = valid();
        config.services.names.clear();
        assert_eq!(invalid_field(&config), "services.names");
    }

    #[test]
    fn test_rejects_relative_host() {
        for host in ["", "api.example.com", "/gateway", "https://"] {
            let mut config = valid();
            config.gateway.host = host.to_string();
            assert_eq!(invalid_field(&config), "gateway.host", "host {host:?}");
        }
    }

    #[test]
    fn test_redis_store_needs_host() {
        let mut config = valid();
        config.token_store.kind = TokenStoreKind::Redis;
        config.token_store.host = " ".to_string();
        assert_eq!(invalid_field(&config), "token_store.host");
    }

    #[test]
    fn test_rejects_zero_response_limit() {
        let mut config = valid();
        config.upstream.max_response_bytes = 0;
        assert_eq!(invalid_field(&config), "upstream.max_response_bytes");
    }

    #[test]
    fn test_change_detection() {
        let base = valid();

        let mut routes = base.clone();
        routes.authority.admin = vec!["ROLE_ROOT".to_string()];
        assert!(base.routes_changed(&routes));
        assert!(!base.requires_restart(&routes));

        let mut server = base.clone();
        server.server.port = 9000;
        assert!(!base.routes_changed(&server));
        assert!(base.requires_restart(&server));
    }
}
