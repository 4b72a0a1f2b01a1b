//! Bearer token authentication.
//!
//! Reads `Authorization: Bearer <token>`, verifies it, and records the
//! resulting [`AuthContext`](portico_core::AuthContext) on the context. The
//! verified subject is forwarded upstream in [`AUTH_SUBJECT_HEADER`].

use crate::auth::TokenVerifier;
use crate::context::FilterContext;
use crate::filter::{BoxFuture, Filter, Next};
use crate::types::{Request, Response};
use http::header::{HeaderValue, AUTHORIZATION};
use portico_core::{AuthFailureReason, GatewayError};
use std::sync::Arc;

/// Header carrying the verified subject to backends.
pub const AUTH_SUBJECT_HEADER: &str = "x-auth-subject";

/// Extracts the bearer token from the `Authorization` header.
pub fn bearer_token(request: &Request) -> Result<&str, AuthFailureReason> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthFailureReason::MissingToken)?
        .to_str()
        .map_err(|_| AuthFailureReason::MalformedToken)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthFailureReason::MalformedToken)?
        .trim();
    if token.is_empty() {
        return Err(AuthFailureReason::MalformedToken);
    }
    Ok(token)
}

/// Authentication stage.
#[derive(Debug, Clone)]
pub struct AuthenticateFilter {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthenticateFilter {
    /// Creates the stage.
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

impl Filter for AuthenticateFilter {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let verified = match bearer_token(&request) {
                Ok(token) => self.verifier.verify(token).await,
                Err(reason) => Err(GatewayError::authentication(reason)),
            };

            let auth = match verified {
                Ok(auth) => auth,
                Err(e) => {
                    tracing::debug!(route_id = ctx.route_id(), error = %e, "authentication failed");
                    return ctx.reject(e);
                }
            };

            match HeaderValue::from_str(auth.subject()) {
                Ok(subject) => {
                    request.headers_mut().insert(AUTH_SUBJECT_HEADER, subject);
                }
                Err(_) => {
                    return ctx.reject(GatewayError::authentication(
                        AuthFailureReason::MalformedToken,
                    ));
                }
            }

            ctx.set_auth(auth);
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    fn request(auth: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/v1/orders/1");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&request(Some("Bearer abc.def"))), Ok("abc.def"));
        assert_eq!(
            bearer_token(&request(None)),
            Err(AuthFailureReason::MissingToken)
        );
        assert_eq!(
            bearer_token(&request(Some("Basic dXNlcjpwYXNz"))),
            Err(AuthFailureReason::MalformedToken)
        );
        assert_eq!(
            bearer_token(&request(Some("Bearer "))),
            Err(AuthFailureReason::MalformedToken)
        );
    }
}
