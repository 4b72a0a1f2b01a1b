//! Per-request filter state.
//!
//! A [`FilterContext`] is created by the dispatcher once a route has matched
//! and is threaded through every stage of that route's chain. Stages record
//! the verified identity here; the dispatcher reads the rejection (if any)
//! back out for logging.

use crate::types::{Request, Response, ResponseExt};
use portico_core::{AuthContext, GatewayError, RequestId};
use portico_telemetry::metrics::record_auth_rejection;

/// State carried through one route's filter chain.
#[derive(Debug)]
pub struct FilterContext {
    request_id: RequestId,
    route_id: String,
    auth: Option<AuthContext>,
    rejection: Option<GatewayError>,
    conceal_forbidden: bool,
}

impl FilterContext {
    /// Creates a context for a request matched to `route_id`.
    #[must_use]
    pub fn new(request_id: RequestId, route_id: impl Into<String>) -> Self {
        Self {
            request_id,
            route_id: route_id.into(),
            auth: None,
            rejection: None,
            conceal_forbidden: false,
        }
    }

    /// Reports authorization failures as 404 instead of 403.
    #[must_use]
    pub fn conceal_forbidden(mut self, conceal: bool) -> Self {
        self.conceal_forbidden = conceal;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the matched route id.
    #[must_use]
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// Returns the verified identity, once authentication has run.
    #[must_use]
    pub fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    /// Records the verified identity.
    pub fn set_auth(&mut self, auth: AuthContext) {
        self.auth = Some(auth);
    }

    /// Returns the error that short-circuited the chain, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&GatewayError> {
        self.rejection.as_ref()
    }

    /// Short-circuits the chain with `error`.
    ///
    /// The error is recorded on the context and rendered as the response.
    pub fn reject(&mut self, error: GatewayError) -> Response {
        let error = if self.conceal_forbidden {
            error.concealed()
        } else {
            error
        };

        match &error {
            GatewayError::Authentication { reason } => {
                record_auth_rejection("authentication", reason.as_str());
            }
            GatewayError::Authorization { .. } => {
                record_auth_rejection("authorization", "insufficient_role");
            }
            GatewayError::NoRouteMatch { .. } if self.conceal_forbidden => {
                record_auth_rejection("authorization", "concealed");
            }
            _ => {}
        }

        let request_id = self.request_id.to_string();
        let response = Response::from_error(&error, Some(&request_id));
        self.rejection = Some(error);
        response
    }
}

/// Returns the request path, for error reporting.
pub(crate) fn request_path(request: &Request) -> String {
    request.uri().path().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use portico_core::AuthFailureReason;

    #[test]
    fn test_reject_records_error() {
        let mut ctx = FilterContext::new(RequestId::new(), "orders-admin-routes");
        let response = ctx.reject(GatewayError::authentication(AuthFailureReason::ExpiredToken));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(matches!(
            ctx.rejection(),
            Some(GatewayError::Authentication {
                reason: AuthFailureReason::ExpiredToken
            })
        ));
    }

    #[test]
    fn test_concealed_forbidden_becomes_not_found() {
        let mut ctx =
            FilterContext::new(RequestId::new(), "orders-admin-routes").conceal_forbidden(true);
        let response = ctx.reject(GatewayError::authorization("orders-admin-routes", "/v1/admin/orders"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(matches!(ctx.rejection(), Some(GatewayError::NoRouteMatch { .. })));
    }

    #[test]
    fn test_concealment_leaves_authentication_alone() {
        let mut ctx = FilterContext::new(RequestId::new(), "r").conceal_forbidden(true);
        let response = ctx.reject(GatewayError::authentication(AuthFailureReason::MissingToken));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
