//! Per-route filter chain composition.
//!
//! Every route gets, in order:
//!
//! 1. three CORS `AddHeader` stages
//! 2. `RewritePath` for docs routes, `StripPrefix(0)` for everything else
//! 3. `Authenticate`, except for the swagger-config singleton (and docs
//!    routes when docs are public)
//! 4. `Authorize(roles)` when the route requires roles
//! 5. `TransformResponseBody(DocRewriter)` for docs routes

use crate::route::{FilterStage, PathRewrite, RouteKind, RouteRule};
use portico_core::{BodyTransformer, GatewayError, GatewayResult};
use portico_docs::DocRewriter;
use std::sync::Arc;

/// CORS header names and values.
pub mod cors {
    /// `Access-Control-Allow-Origin`
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods`
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers`
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";

    /// Allowed origins.
    pub const ORIGIN_VALUE: &str = "*";
    /// Allowed methods.
    pub const METHODS_VALUE: &str = "GET, POST, PUT, DELETE, OPTIONS";
    /// Allowed request headers.
    pub const HEADERS_VALUE: &str =
        "Authorization, Refreshtoken, Content-Type, X-Requested-With, X-XSRF-TOKEN";
}

/// Builds the ordered filter chain for each route.
#[derive(Debug, Clone)]
pub struct FilterChainComposer {
    doc_transformer: Arc<dyn BodyTransformer>,
    public_docs: bool,
}

impl FilterChainComposer {
    /// Creates a composer whose docs routes rewrite documents to point at
    /// `gateway_host`.
    pub fn new(gateway_host: impl Into<String>) -> Self {
        Self {
            doc_transformer: Arc::new(DocRewriter::new(gateway_host)),
            public_docs: false,
        }
    }

    /// Serves per-service documents without authentication.
    pub fn public_docs(mut self, public: bool) -> Self {
        self.public_docs = public;
        self
    }

    /// Returns the filter chain for `rule`.
    pub fn compose(&self, rule: &RouteRule) -> GatewayResult<Vec<FilterStage>> {
        let mut stages = cors_stages();

        match rule.kind() {
            RouteKind::Docs => {
                let service_id = rule.service_id().ok_or_else(|| {
                    GatewayError::configuration(format!(
                        "docs route '{}' has no owning service",
                        rule.id()
                    ))
                })?;
                stages.push(FilterStage::RewritePath(PathRewrite::docs(service_id)?));
            }
            _ => stages.push(FilterStage::StripPrefix(0)),
        }

        if self.requires_authentication(rule) {
            stages.push(FilterStage::Authenticate);
        }
        if let Some(roles) = rule.required_roles() {
            stages.push(FilterStage::Authorize(roles.clone()));
        }

        if rule.kind() == RouteKind::Docs {
            stages.push(FilterStage::TransformResponseBody(Arc::clone(
                &self.doc_transformer,
            )));
        }

        Ok(stages)
    }

    fn requires_authentication(&self, rule: &RouteRule) -> bool {
        // Role checks never run without an identity.
        if rule.required_roles().is_some() {
            return true;
        }
        match rule.kind() {
            RouteKind::SwaggerIndex => false,
            RouteKind::Docs => !self.public_docs,
            RouteKind::RoleScoped | RouteKind::DefaultProtected => true,
        }
    }
}

/// The three CORS header stages every route starts with.
pub fn cors_stages() -> Vec<FilterStage> {
    vec![
        FilterStage::add_header(cors::ALLOW_ORIGIN, cors::ORIGIN_VALUE),
        FilterStage::add_header(cors::ALLOW_METHODS, cors::METHODS_VALUE),
        FilterStage::add_header(cors::ALLOW_HEADERS, cors::HEADERS_VALUE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PathPattern;
    use portico_core::{RoleGroup, RoleSet};

    fn rule(kind: RouteKind, pattern: &str) -> RouteRule {
        RouteRule::new("r", PathPattern::parse(pattern).unwrap(), "lb://orders-service", kind)
            .for_service("orders-service")
    }

    fn names(stages: &[FilterStage]) -> Vec<&'static str> {
        stages.iter().map(FilterStage::name).collect()
    }

    #[test]
    fn test_role_scoped_chain() {
        let roles: RoleSet = ["ROLE_ADMIN".to_string()].into_iter().collect();
        let rule = rule(RouteKind::RoleScoped, "/v1/admin/orders/**").requiring(RoleGroup::Admin, roles.clone());
        let stages = FilterChainComposer::new("http://gw").compose(&rule).unwrap();

        assert_eq!(
            names(&stages),
            vec!["add_header", "add_header", "add_header", "strip_prefix", "authenticate", "authorize"]
        );
        assert!(matches!(stages[3], FilterStage::StripPrefix(0)));
        assert!(matches!(&stages[5], FilterStage::Authorize(r) if *r == roles));
    }

    #[test]
    fn test_default_chain_is_authenticated_only() {
        let stages = FilterChainComposer::new("http://gw")
            .compose(&rule(RouteKind::DefaultProtected, "/v1/orders/**"))
            .unwrap();
        assert_eq!(
            names(&stages),
            vec!["add_header", "add_header", "add_header", "strip_prefix", "authenticate"]
        );
    }

    #[test]
    fn test_docs_chain() {
        let stages = FilterChainComposer::new("http://gw")
            .compose(&rule(RouteKind::Docs, "/orders-service/v3/api-docs/**"))
            .unwrap();
        assert_eq!(
            names(&stages),
            vec![
                "add_header",
                "add_header",
                "add_header",
                "rewrite_path",
                "authenticate",
                "transform_response_body"
            ]
        );
        match &stages[3] {
            FilterStage::RewritePath(r) => {
                assert_eq!(r.apply("/orders-service/v3/api-docs/x"), "/v3/api-docs/x");
            }
            other => panic!("unexpected stage {other}"),
        }
    }

    #[test]
    fn test_public_docs_skip_authentication() {
        let stages = FilterChainComposer::new("http://gw")
            .public_docs(true)
            .compose(&rule(RouteKind::Docs, "/orders-service/v3/api-docs/**"))
            .unwrap();
        assert!(!names(&stages).contains(&"authenticate"));
    }

    #[test]
    fn test_swagger_index_is_public() {
        let rule = RouteRule::new(
            "swagger-config",
            PathPattern::parse("/v3/api-docs/swagger-config").unwrap(),
            "http://gw",
            RouteKind::SwaggerIndex,
        );
        let stages = FilterChainComposer::new("http://gw").compose(&rule).unwrap();
        assert_eq!(
            names(&stages),
            vec!["add_header", "add_header", "add_header", "strip_prefix"]
        );
    }

    #[test]
    fn test_docs_route_without_service_is_rejected() {
        let rule = RouteRule::new(
            "d",
            PathPattern::parse("/x/v3/api-docs/**").unwrap(),
            "lb://x",
            RouteKind::Docs,
        );
        assert!(FilterChainComposer::new("http://gw").compose(&rule).is_err());
    }

    #[test]
    fn test_cors_values() {
        let stages = cors_stages();
        let rendered: Vec<String> = stages.iter().map(ToString::to_string).collect();
        assert_eq!(rendered[0], "AddHeader(access-control-allow-origin: *)");
        assert_eq!(
            rendered[1],
            "AddHeader(access-control-allow-methods: GET, POST, PUT, DELETE, OPTIONS)"
        );
        assert!(rendered[2].contains("Refreshtoken"));
    }
}
