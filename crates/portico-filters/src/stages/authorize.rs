//! Role-based authorization.
//!
//! Access is granted when the verified identity holds at least one of the
//! route's required roles. An empty requirement set denies everyone.

use crate::context::{request_path, FilterContext};
use crate::filter::{BoxFuture, Filter, Next};
use crate::types::{Request, Response};
use portico_core::{AuthContext, AuthFailureReason, GatewayError, RoleSet};

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Request may proceed.
    Allow,
    /// Request is refused.
    Deny {
        /// Why.
        reason: String,
    },
}

impl PolicyDecision {
    /// Returns `true` for [`PolicyDecision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether `auth` satisfies `required`.
pub fn evaluate(auth: Option<&AuthContext>, required: &RoleSet) -> PolicyDecision {
    let Some(auth) = auth else {
        return PolicyDecision::Deny {
            reason: "no verified identity".to_string(),
        };
    };
    if required.is_empty() {
        return PolicyDecision::Deny {
            reason: "route requires roles but none are configured".to_string(),
        };
    }
    if auth.has_any_role(required) {
        PolicyDecision::Allow
    } else {
        PolicyDecision::Deny {
            reason: format!("subject '{}' holds none of the required roles", auth.subject()),
        }
    }
}

/// Authorization stage.
#[derive(Debug, Clone)]
pub struct AuthorizeFilter {
    required: RoleSet,
}

impl AuthorizeFilter {
    /// Creates the stage.
    pub fn new(required: RoleSet) -> Self {
        Self { required }
    }

    /// Returns the accepted roles.
    pub fn required(&self) -> &RoleSet {
        &self.required
    }
}

impl Filter for AuthorizeFilter {
    fn name(&self) -> &'static str {
        "authorize"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            // Authentication always runs first; a missing identity means it did not.
            if ctx.auth().is_none() {
                return ctx.reject(GatewayError::authentication(AuthFailureReason::MissingToken));
            }

            match evaluate(ctx.auth(), &self.required) {
                PolicyDecision::Allow => next.run(ctx, request).await,
                PolicyDecision::Deny { reason } => {
                    tracing::info!(route_id = ctx.route_id(), reason = %reason, "access denied");
                    let route_id = ctx.route_id().to_string();
                    ctx.reject(GatewayError::authorization(route_id, request_path(&request)))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().map(ToString::to_string).collect()
    }

    fn user(granted: &[&str]) -> AuthContext {
        AuthContext::new("u", granted.iter().copied(), Utc::now() + Duration::minutes(5))
    }

    #[test]
    fn test_any_matching_role_allows() {
        let required = roles(&["ROLE_ADMIN", "ROLE_SUPER"]);
        assert!(evaluate(Some(&user(&["ROLE_SUPER"])), &required).is_allowed());
    }

    #[test]
    fn test_no_matching_role_denies() {
        let decision = evaluate(Some(&user(&["ROLE_MEMBER"])), &roles(&["ROLE_ADMIN"]));
        assert!(matches!(decision, PolicyDecision::Deny { .. }));
    }

    #[test]
    fn test_empty_requirement_denies_everyone() {
        assert!(!evaluate(Some(&user(&["ROLE_ADMIN"])), &RoleSet::new()).is_allowed());
    }

    #[test]
    fn test_missing_identity_denies() {
        assert!(!evaluate(None, &roles(&["ROLE_ADMIN"])).is_allowed());
    }
}
