//! Compiled per-route filter chains.
//!
//! [`FilterChain::compile`] turns a route's declarative
//! [`FilterStage`] list into executable filters. Stages run in declaration
//! order on the way in and in reverse on the way out, so the header stages
//! at the front of every chain see every response, including rejections.

use crate::auth::TokenVerifier;
use crate::context::FilterContext;
use crate::filter::{BoxFuture, Filter, Next};
use crate::stages::{
    AddResponseHeaders, AuthenticateFilter, AuthorizeFilter, RewritePathFilter,
    StripPrefixFilter, TransformBodyFilter, DEFAULT_MAX_BODY_BYTES,
};
use crate::types::{Request, Response, ResponseExt};
use http::StatusCode;
use portico_router::{FilterStage, RouteRule};
use std::sync::Arc;

/// Shared resources stages are compiled against.
#[derive(Debug, Clone)]
pub struct ChainResources {
    /// Verifier used by `Authenticate` stages.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Largest response body `TransformResponseBody` will rewrite.
    pub max_document_bytes: usize,
}

impl ChainResources {
    /// Creates resources with the default document size limit.
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier,
            max_document_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Executable filter chain for one route.
pub struct FilterChain {
    route_id: String,
    filters: Vec<Arc<dyn Filter>>,
    response_headers: AddResponseHeaders,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("route_id", &self.route_id)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl FilterChain {
    /// Compiles `rule`'s filter stages.
    pub fn compile(rule: &RouteRule, resources: &ChainResources) -> Self {
        let mut filters: Vec<Arc<dyn Filter>> = Vec::with_capacity(rule.filters().len());
        let mut headers = Vec::new();
        let mut all_headers = Vec::new();

        for stage in rule.filters() {
            if let FilterStage::AddHeader { name, value } = stage {
                headers.push((name.clone(), value.clone()));
                all_headers.push((name.clone(), value.clone()));
                continue;
            }
            if !headers.is_empty() {
                filters.push(Arc::new(AddResponseHeaders::new(std::mem::take(&mut headers))));
            }

            let filter: Arc<dyn Filter> = match stage {
                FilterStage::AddHeader { .. } => continue,
                FilterStage::RewritePath(rewrite) => Arc::new(RewritePathFilter::new(rewrite.clone())),
                FilterStage::StripPrefix(n) => Arc::new(StripPrefixFilter::new(*n)),
                FilterStage::Authenticate => {
                    Arc::new(AuthenticateFilter::new(Arc::clone(&resources.verifier)))
                }
                FilterStage::Authorize(roles) => Arc::new(AuthorizeFilter::new(roles.clone())),
                FilterStage::TransformResponseBody(transformer) => Arc::new(
                    TransformBodyFilter::new(Arc::clone(transformer), resources.max_document_bytes),
                ),
            };
            filters.push(filter);
        }
        if !headers.is_empty() {
            filters.push(Arc::new(AddResponseHeaders::new(headers)));
        }

        Self {
            route_id: rule.id().to_string(),
            filters,
            response_headers: AddResponseHeaders::new(all_headers),
        }
    }

    /// Returns the route id.
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// Returns the executable stage names in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Runs the chain, finishing with `terminal` unless a stage
    /// short-circuits.
    pub async fn run<'a, T>(
        &'a self,
        ctx: &mut FilterContext,
        request: Request,
        terminal: T,
    ) -> Response
    where
        T: FnOnce(&mut FilterContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::terminal(terminal);
        for filter in self.filters.iter().rev() {
            next = Next::new(filter.as_ref(), next);
        }
        next.run(ctx, request).await
    }

    /// Answers a CORS preflight with the route's headers.
    pub fn preflight(&self) -> Response {
        let mut response = Response::empty(StatusCode::NO_CONTENT);
        self.response_headers.apply(&mut response);
        response
    }

    /// Adds the route's response headers to `response`.
    pub fn decorate(&self, response: &mut Response) {
        self.response_headers.apply(response);
    }
}
