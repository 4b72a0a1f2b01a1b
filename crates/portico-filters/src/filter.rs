//! The [`Filter`] trait and the [`Next`] continuation.
//!
//! A filter receives the mutable [`FilterContext`], the request, and a
//! [`Next`] that runs the rest of the chain. A filter either calls
//! `next.run()` exactly once or returns its own response, which
//! short-circuits every later stage and the upstream call.
//!
//! # Example
//!
//! ```ignore
//! use portico_filters::{BoxFuture, Filter, FilterContext, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Filter for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut FilterContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let started = std::time::Instant::now();
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(route = ctx.route_id(), elapsed = ?started.elapsed(), "chain finished");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::FilterContext;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal step of a chain: forwards the (possibly rewritten) request.
pub type Terminal<'a> =
    Box<dyn FnOnce(&mut FilterContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

/// One executable stage of a route's filter chain.
pub trait Filter: Send + Sync + 'static {
    /// Stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, optionally delegating to `next`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The remainder of a filter chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        filter: &'a dyn Filter,
        next: Box<Next<'a>>,
    },
    Terminal(Terminal<'a>),
}

impl<'a> Next<'a> {
    pub(crate) fn new(filter: &'a dyn Filter, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                filter,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(&mut FilterContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// Runs the next stage, or the terminal step if no stages remain.
    pub async fn run(self, ctx: &mut FilterContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { filter, next } => filter.process(ctx, request, *next).await,
            NextInner::Terminal(terminal) => terminal(ctx, request).await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            NextInner::Chain { filter, .. } => write!(f, "Next({})", filter.name()),
            NextInner::Terminal(_) => f.write_str("Next(terminal)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use portico_core::RequestId;

    struct Tag(&'static str);

    impl Filter for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut FilterContext,
            mut request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                request
                    .headers_mut()
                    .append("x-visited", self.0.parse().unwrap());
                next.run(ctx, request).await
            })
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_before_terminal() {
        let first = Tag("first");
        let second = Tag("second");
        let next = Next::new(
            &first,
            Next::new(
                &second,
                Next::terminal(|_ctx, req: Request| {
                    let visited: Vec<String> = req
                        .headers()
                        .get_all("x-visited")
                        .iter()
                        .map(|v| v.to_str().unwrap().to_string())
                        .collect();
                    Box::pin(async move {
                        assert_eq!(visited, vec!["first", "second"]);
                        Response::empty(StatusCode::OK)
                    })
                }),
            ),
        );
        assert_eq!(format!("{next:?}"), "Next(first)");

        let mut ctx = FilterContext::new(RequestId::new(), "r");
        let request = http::Request::builder()
            .uri("/x")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = next.run(&mut ctx, request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
