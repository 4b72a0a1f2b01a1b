//! Path rewriting stages.
//!
//! Both stages change only the path; the query string is carried over.

use crate::context::FilterContext;
use crate::filter::{BoxFuture, Filter, Next};
use crate::types::{Request, Response};
use http::uri::{PathAndQuery, Uri};
use portico_core::GatewayError;
use portico_router::{strip_prefix, PathRewrite};

/// Replaces the request path with `path`, keeping the query.
fn replace_path(request: &mut Request, path: &str) -> Result<(), GatewayError> {
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let path_and_query = PathAndQuery::try_from(path_and_query)
        .map_err(|e| GatewayError::internal(format!("rewritten path is invalid: {e}")))?;

    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    *request.uri_mut() = Uri::from_parts(parts)
        .map_err(|e| GatewayError::internal(format!("rewritten uri is invalid: {e}")))?;
    Ok(())
}

/// Regex path rewrite.
#[derive(Debug, Clone)]
pub struct RewritePathFilter {
    rewrite: PathRewrite,
}

impl RewritePathFilter {
    /// Creates the stage.
    pub fn new(rewrite: PathRewrite) -> Self {
        Self { rewrite }
    }
}

impl Filter for RewritePathFilter {
    fn name(&self) -> &'static str {
        "rewrite_path"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let rewritten = self.rewrite.apply(request.uri().path());
            tracing::trace!(from = request.uri().path(), to = %rewritten, "path rewritten");
            if let Err(e) = replace_path(&mut request, &rewritten) {
                return ctx.reject(e);
            }
            next.run(ctx, request).await
        })
    }
}

/// Drops the first `n` path segments.
#[derive(Debug, Clone, Copy)]
pub struct StripPrefixFilter {
    segments: usize,
}

impl StripPrefixFilter {
    /// Creates the stage.
    pub fn new(segments: usize) -> Self {
        Self { segments }
    }
}

impl Filter for StripPrefixFilter {
    fn name(&self) -> &'static str {
        "strip_prefix"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.segments > 0 {
                let stripped = strip_prefix(request.uri().path(), self.segments);
                if let Err(e) = replace_path(&mut request, &stripped) {
                    return ctx.reject(e);
                }
            }
            next.run(ctx, request).await
        })
    }
}
