//! Error types for the gateway server.

use portico_config::ConfigError;
use portico_core::GatewayError;
use portico_filters::auth::StoreError;
use portico_telemetry::TelemetryError;
use thiserror::Error;

/// Failure to start or run the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The route table could not be built.
    #[error(transparent)]
    Routes(#[from] GatewayError),

    /// The token-state store could not be reached at startup.
    #[error("Token store error: {0}")]
    TokenStore(#[from] StoreError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The upstream client could not be built.
    #[error("Upstream client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Failure forwarding a request to a backend.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No instance is configured for the logical target.
    #[error("no instances registered for '{target}'")]
    NoInstances {
        /// Logical target.
        target: String,
    },

    /// The target is neither `lb://name` nor an absolute http(s) URL.
    #[error("unsupported target '{target}'")]
    UnsupportedTarget {
        /// Logical target.
        target: String,
    },

    /// The backend refused or dropped the connection.
    #[error("connection to '{target}' failed: {message}")]
    Connect {
        /// Logical target.
        target: String,
        /// Failure detail.
        message: String,
    },

    /// The backend did not answer within the client timeout.
    #[error("request to '{target}' timed out")]
    Timeout {
        /// Logical target.
        target: String,
    },

    /// The backend response body exceeded `upstream.max_response_bytes`.
    #[error("response from '{target}' exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Logical target.
        target: String,
        /// The configured limit.
        limit: usize,
    },

    /// The backend answered with something that is not valid HTTP.
    #[error("request to '{target}' failed: {message}")]
    Request {
        /// Logical target.
        target: String,
        /// Failure detail.
        message: String,
    },
}

impl UpstreamError {
    /// Classifies a client error for `target`.
    pub fn from_reqwest(target: &str, err: &reqwest::Error) -> Self {
        let target = target.to_string();
        if err.is_timeout() {
            Self::Timeout { target }
        } else if err.is_connect() {
            Self::Connect {
                target,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                target,
                message: err.to_string(),
            }
        }
    }

    /// Returns the logical target.
    pub fn target(&self) -> &str {
        match self {
            Self::NoInstances { target }
            | Self::UnsupportedTarget { target }
            | Self::Connect { target, .. }
            | Self::Timeout { target }
            | Self::ResponseTooLarge { target, .. }
            | Self::Request { target, .. } => target,
        }
    }
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        let message = err.to_string();
        match err {
            UpstreamError::NoInstances { target } | UpstreamError::UnsupportedTarget { target } => {
                Self::upstream_unavailable(target, message)
            }
            UpstreamError::Connect { target, .. }
            | UpstreamError::Timeout { target }
            | UpstreamError::ResponseTooLarge { target, .. }
            | UpstreamError::Request { target, .. } => Self::upstream_failure(target, message),
        }
    }
}
