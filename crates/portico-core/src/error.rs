//! Error types for Portico.
//!
//! [`GatewayError`] covers both load-time failures (bad configuration) and
//! request-scoped rejections. Request-scoped errors are rendered into a
//! response at the point of failure using [`GatewayError::to_envelope`]:
//!
//! ```json
//! {
//!   "error": { "code": "AUTHENTICATION_FAILED", "message": "...", "reason": "expired_token" },
//!   "request_id": "0190..."
//! }
//! ```
//!
//! | Variant | Status |
//! |---------|--------|
//! | `Configuration` | 500 (never served, aborts startup) |
//! | `InvalidPath` | 400 |
//! | `NoRouteMatch` | 404 |
//! | `Authentication` | 401 |
//! | `Authorization` | 403 |
//! | `PayloadTooLarge` | 413 |
//! | `UpstreamFailure` | 502 |
//! | `UpstreamUnavailable` | 503 |
//! | `TokenStoreUnavailable` | 503 |
//! | `DeadlineExceeded` | 504 |
//! | `DocumentTransform` | 500 (logged, original body served) |
//! | `Internal` | 500 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Why a bearer token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureReason {
    /// No `Authorization: Bearer` header.
    MissingToken,
    /// The token could not be decoded.
    MalformedToken,
    /// The token is past its expiry.
    ExpiredToken,
    /// The signature or a validated claim did not check out.
    InvalidSignature,
    /// The token was revoked in the token-state store.
    RevokedToken,
}

impl AuthFailureReason {
    /// Returns the reason as a stable snake_case string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::ExpiredToken => "expired_token",
            Self::InvalidSignature => "invalid_signature",
            Self::RevokedToken => "revoked_token",
        }
    }
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`GatewayError`], used for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid configuration.
    Configuration,
    /// Request path refused before routing.
    InvalidPath,
    /// No route matched.
    NoRoute,
    /// Authentication rejected.
    Authentication,
    /// Authorization rejected.
    Authorization,
    /// Request body too large.
    PayloadTooLarge,
    /// Backend dispatch failed.
    Upstream,
    /// Token-state store failed.
    TokenStore,
    /// Deadline elapsed.
    Timeout,
    /// Documentation rewrite failed.
    DocumentTransform,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns the kind as a snake_case string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InvalidPath => "invalid_path",
            Self::NoRoute => "no_route",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Upstream => "upstream",
            Self::TokenStore => "token_store",
            Self::Timeout => "timeout",
            Self::DocumentTransform => "document_transform",
            Self::Internal => "internal",
        }
    }
}

/// Standard error type for Portico.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Invalid configuration. Fatal at load.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was wrong.
        message: String,
    },

    /// The request path holds dot segments and is refused before routing.
    #[error("Invalid request path '{path}'")]
    InvalidPath {
        /// The request path.
        path: String,
    },

    /// No route pattern matched the request path.
    #[error("No route matches '{path}'")]
    NoRouteMatch {
        /// The request path.
        path: String,
    },

    /// The bearer token was missing or failed verification.
    #[error("Authentication failed: {reason}")]
    Authentication {
        /// Why the token was rejected.
        reason: AuthFailureReason,
    },

    /// The caller is authenticated but holds none of the required roles.
    #[error("Access denied to route '{route_id}'")]
    Authorization {
        /// The matched route.
        route_id: String,
        /// The request path.
        path: String,
    },

    /// The request body exceeded the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The configured limit.
        limit: usize,
    },

    /// The backend could not be reached or returned an invalid response.
    #[error("Upstream '{target}' failed: {message}")]
    UpstreamFailure {
        /// Logical target.
        target: String,
        /// Failure detail.
        message: String,
    },

    /// No healthy backend instance for the target.
    #[error("Upstream '{target}' unavailable: {message}")]
    UpstreamUnavailable {
        /// Logical target.
        target: String,
        /// Failure detail.
        message: String,
    },

    /// The token-state store did not answer.
    #[error("Token store unavailable: {message}")]
    TokenStoreUnavailable {
        /// Failure detail.
        message: String,
    },

    /// The per-request deadline elapsed.
    #[error("Request exceeded deadline of {timeout_ms}ms")]
    DeadlineExceeded {
        /// The configured deadline.
        timeout_ms: u64,
    },

    /// A documentation document could not be rewritten.
    #[error("Document transform failed: {message}")]
    DocumentTransform {
        /// Failure detail.
        message: String,
    },

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Failure detail.
        message: String,
    },
}

impl GatewayError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invalid-path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Creates a no-route error.
    pub fn no_route(path: impl Into<String>) -> Self {
        Self::NoRouteMatch { path: path.into() }
    }

    /// Creates an authentication error.
    pub const fn authentication(reason: AuthFailureReason) -> Self {
        Self::Authentication { reason }
    }

    /// Creates an authorization error.
    pub fn authorization(route_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Authorization {
            route_id: route_id.into(),
            path: path.into(),
        }
    }

    /// Creates an upstream failure (502).
    pub fn upstream_failure(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an upstream unavailable error (503).
    pub fn upstream_unavailable(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a token store error.
    pub fn token_store(message: impl Into<String>) -> Self {
        Self::TokenStoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a document transform error.
    pub fn document_transform(message: impl Into<String>) -> Self {
        Self::DocumentTransform {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::NoRouteMatch { .. } => ErrorKind::NoRoute,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::UpstreamFailure { .. } | Self::UpstreamUnavailable { .. } => ErrorKind::Upstream,
            Self::TokenStoreUnavailable { .. } => ErrorKind::TokenStore,
            Self::DeadlineExceeded { .. } => ErrorKind::Timeout,
            Self::DocumentTransform { .. } => ErrorKind::DocumentTransform,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            Self::NoRouteMatch { .. } => StatusCode::NOT_FOUND,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnavailable { .. } | Self::TokenStoreUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Configuration { .. } | Self::DocumentTransform { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a machine-readable error code.
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::NoRouteMatch { .. } => "NO_ROUTE",
            Self::Authentication { .. } => "AUTHENTICATION_FAILED",
            Self::Authorization { .. } => "ACCESS_DENIED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::UpstreamFailure { .. } => "UPSTREAM_ERROR",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::TokenStoreUnavailable { .. } => "TOKEN_STORE_UNAVAILABLE",
            Self::DeadlineExceeded { .. } => "GATEWAY_TIMEOUT",
            Self::DocumentTransform { .. } => "DOCUMENT_TRANSFORM_FAILED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Rewrites an authorization failure as a no-route failure, so a caller
    /// cannot tell a forbidden route from a missing one.
    pub fn concealed(self) -> Self {
        match self {
            Self::Authorization { path, .. } => Self::NoRouteMatch { path },
            other => other,
        }
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// Upstream and internal details are logged, not sent to the client.
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let message = match self {
            Self::InvalidPath { .. } => "Invalid request path".to_string(),
            Self::NoRouteMatch { .. } => "No route found".to_string(),
            Self::Authorization { .. } => "Access denied".to_string(),
            Self::UpstreamFailure { .. } => "Upstream service error".to_string(),
            Self::UpstreamUnavailable { .. } => "Upstream service unavailable".to_string(),
            Self::TokenStoreUnavailable { .. } => "Authentication service unavailable".to_string(),
            Self::Configuration { .. } | Self::DocumentTransform { .. } | Self::Internal { .. } => {
                "Internal gateway error".to_string()
            }
            other => other.to_string(),
        };
        let reason = match self {
            Self::Authentication { reason } => Some(reason.as_str().to_string()),
            _ => None,
        };

        ErrorEnvelope {
            error: ErrorDetail {
                code: self.reason_code().to_string(),
                message,
                reason,
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Serialized error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Error detail.
    pub error: ErrorDetail,
    /// Request correlation id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail inside an [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Sub-reason, for authentication failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
