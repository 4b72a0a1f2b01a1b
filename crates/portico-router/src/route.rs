//! Route rules and filter stages.

use crate::pattern::PathPattern;
use http::{HeaderName, HeaderValue};
use portico_core::{BodyTransformer, GatewayError, GatewayResult, RoleGroup, RoleSet};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// What a route is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// The public Swagger UI configuration singleton.
    SwaggerIndex,
    /// A service's OpenAPI document.
    Docs,
    /// API access restricted to one role group.
    RoleScoped,
    /// API access for any authenticated caller.
    DefaultProtected,
}

/// A regex based path rewrite.
#[derive(Debug, Clone)]
pub struct PathRewrite {
    pattern: Regex,
    replacement: String,
}

impl PathRewrite {
    /// Compiles a rewrite. `replacement` may reference named groups as
    /// `${name}`.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> GatewayResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            GatewayError::configuration(format!("invalid rewrite pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }

    /// Rewrite mapping `/{service_id}/v3/api-docs...` to `/v3/api-docs...`.
    pub fn docs(service_id: &str) -> GatewayResult<Self> {
        Self::new(
            &format!(
                "^/{}/v3/api-docs(?P<remaining>.*)$",
                regex::escape(service_id)
            ),
            "/v3/api-docs${remaining}",
        )
    }

    /// Returns the match pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the replacement template.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Applies the rewrite. Paths that do not match are returned as is.
    pub fn apply(&self, path: &str) -> String {
        self.pattern
            .replace(path, self.replacement.as_str())
            .into_owned()
    }
}

/// Removes the first `segments` path segments.
///
/// `0` returns the path unchanged.
pub fn strip_prefix(path: &str, segments: usize) -> String {
    if segments == 0 {
        return path.to_string();
    }
    let rest: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .skip(segments)
        .collect();
    format!("/{}", rest.join("/"))
}

/// One unit of per-request processing, executed in declaration order.
#[derive(Clone)]
pub enum FilterStage {
    /// Sets a response header.
    AddHeader {
        /// Header name.
        name: HeaderName,
        /// Header value.
        value: HeaderValue,
    },
    /// Rewrites the forwarded path.
    RewritePath(PathRewrite),
    /// Drops leading path segments before forwarding.
    StripPrefix(usize),
    /// Requires a verified bearer token.
    Authenticate,
    /// Requires one of the given roles.
    Authorize(RoleSet),
    /// Rewrites the buffered response body.
    TransformResponseBody(Arc<dyn BodyTransformer>),
}

impl FilterStage {
    /// Creates an `AddHeader` stage from static strings.
    pub fn add_header(name: &'static str, value: &'static str) -> Self {
        Self::AddHeader {
            name: HeaderName::from_static(name),
            value: HeaderValue::from_static(value),
        }
    }

    /// Returns the stage name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddHeader { .. } => "add_header",
            Self::RewritePath(_) => "rewrite_path",
            Self::StripPrefix(_) => "strip_prefix",
            Self::Authenticate => "authenticate",
            Self::Authorize(_) => "authorize",
            Self::TransformResponseBody(_) => "transform_response_body",
        }
    }
}

impl fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddHeader { name, value } => {
                write!(f, "AddHeader({name}: {})", value.to_str().unwrap_or("<binary>"))
            }
            Self::RewritePath(r) => write!(f, "RewritePath({} -> {})", r.pattern(), r.replacement()),
            Self::StripPrefix(n) => write!(f, "StripPrefix({n})"),
            Self::Authenticate => f.write_str("Authenticate"),
            Self::Authorize(roles) => {
                let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
                write!(f, "Authorize({})", roles.join(", "))
            }
            Self::TransformResponseBody(t) => write!(f, "TransformResponseBody({})", t.name()),
        }
    }
}

impl Serialize for FilterStage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single route: pattern, target and the filter chain bound to it.
#[derive(Debug, Clone, Serialize)]
pub struct RouteRule {
    id: String,
    pattern: PathPattern,
    target: String,
    kind: RouteKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role_group: Option<RoleGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_roles: Option<RoleSet>,
    filters: Vec<FilterStage>,
}

impl RouteRule {
    /// Creates a rule with no filters.
    pub fn new(
        id: impl Into<String>,
        pattern: PathPattern,
        target: impl Into<String>,
        kind: RouteKind,
    ) -> Self {
        Self {
            id: id.into(),
            pattern,
            target: target.into(),
            kind,
            service_id: None,
            role_group: None,
            required_roles: None,
            filters: Vec::new(),
        }
    }

    /// Records the owning service.
    pub fn for_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Restricts the route to callers holding one of `roles`.
    pub fn requiring(mut self, group: RoleGroup, roles: RoleSet) -> Self {
        self.role_group = Some(group);
        self.required_roles = Some(roles);
        self
    }

    /// Replaces the filter chain.
    pub fn with_filters(mut self, filters: Vec<FilterStage>) -> Self {
        self.filters = filters;
        self
    }

    /// Returns the unique route id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the path pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the logical target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the route kind.
    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    /// Returns the owning service id.
    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    /// Returns the role group for role-scoped routes.
    pub fn role_group(&self) -> Option<RoleGroup> {
        self.role_group
    }

    /// Returns the required roles, if any.
    pub fn required_roles(&self) -> Option<&RoleSet> {
        self.required_roles.as_ref()
    }

    /// Returns the filter chain.
    pub fn filters(&self) -> &[FilterStage] {
        &self.filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docs_rewrite() {
        let rewrite = PathRewrite::docs("orders-service").unwrap();
        assert_eq!(rewrite.apply("/orders-service/v3/api-docs"), "/v3/api-docs");
        assert_eq!(
            rewrite.apply("/orders-service/v3/api-docs/public"),
            "/v3/api-docs/public"
        );
        assert_eq!(rewrite.apply("/other/v3/api-docs"), "/other/v3/api-docs");
    }

    #[test]
    fn test_docs_rewrite_escapes_service_id() {
        let rewrite = PathRewrite::docs("a.b").unwrap();
        assert_eq!(rewrite.apply("/axb/v3/api-docs"), "/axb/v3/api-docs");
        assert_eq!(rewrite.apply("/a.b/v3/api-docs"), "/v3/api-docs");
    }

    #[test]
    fn test_invalid_rewrite_is_configuration_error() {
        let err = PathRewrite::new("(", "x").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/v1/orders/1", 0), "/v1/orders/1");
        assert_eq!(strip_prefix("/v1/orders/1", 1), "/orders/1");
        assert_eq!(strip_prefix("/v1/orders/1", 3), "/");
        assert_eq!(strip_prefix("/v1", 5), "/");
    }

    #[test]
    fn test_stage_display() {
        let stage = FilterStage::add_header("access-control-allow-origin", "*");
        assert_eq!(stage.to_string(), "AddHeader(access-control-allow-origin: *)");
        let roles: RoleSet = ["B".to_string(), "A".to_string()].into_iter().collect();
        assert_eq!(FilterStage::Authorize(roles).to_string(), "Authorize(A, B)");
        assert_eq!(FilterStage::StripPrefix(0).name(), "strip_prefix");
    }
}
