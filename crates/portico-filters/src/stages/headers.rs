//! Response header stage.

use crate::context::FilterContext;
use crate::filter::{BoxFuture, Filter, Next};
use crate::types::{Request, Response};
use http::header::{HeaderName, HeaderValue};

/// Adds fixed headers to every response, including rejections produced by
/// later stages.
#[derive(Debug, Clone, Default)]
pub struct AddResponseHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl AddResponseHeaders {
    /// Creates the stage.
    pub fn new(headers: Vec<(HeaderName, HeaderValue)>) -> Self {
        Self { headers }
    }

    /// Returns the headers this stage adds.
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// Writes the headers onto `response`, replacing existing values.
    pub fn apply(&self, response: &mut Response) {
        let target = response.headers_mut();
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}

impl Filter for AddResponseHeaders {
    fn name(&self) -> &'static str {
        "add_header"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = next.run(ctx, request).await;
            self.apply(&mut response);
            response
        })
    }
}
