//! Response body transformation.
//!
//! Only successful, uncompressed responses within the size limit are
//! transformed. When the transformer fails, the original body is served
//! unchanged and the failure is logged and counted.

use crate::context::FilterContext;
use crate::filter::{BoxFuture, Filter, Next};
use crate::types::{Request, Response};
use http::header::{HeaderValue, CONTENT_ENCODING, CONTENT_LENGTH};
use http_body_util::{BodyExt, Full};
use portico_core::BodyTransformer;
use portico_telemetry::metrics::record_doc_rewrite_failure;
use std::sync::Arc;

/// Default maximum body size the stage will buffer and rewrite.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Response body transform stage.
#[derive(Debug, Clone)]
pub struct TransformBodyFilter {
    transformer: Arc<dyn BodyTransformer>,
    max_bytes: usize,
}

impl TransformBodyFilter {
    /// Creates the stage.
    pub fn new(transformer: Arc<dyn BodyTransformer>, max_bytes: usize) -> Self {
        Self {
            transformer,
            max_bytes,
        }
    }

    fn eligible(&self, response: &Response) -> bool {
        if !response.status().is_success() || response.headers().contains_key(CONTENT_ENCODING) {
            return false;
        }
        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        declared.map_or(true, |len| len <= self.max_bytes)
    }

    async fn transform(&self, route_id: &str, response: Response) -> Response {
        let (mut parts, body) = response.into_parts();
        let original = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        if original.len() > self.max_bytes {
            return Response::from_parts(parts, Full::new(original));
        }

        let body = match self.transformer.transform(&original) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::warn!(
                    route_id,
                    transformer = self.transformer.name(),
                    error = %e,
                    "response transform failed; serving original body"
                );
                record_doc_rewrite_failure(route_id);
                original
            }
        };

        parts
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        Response::from_parts(parts, Full::new(body))
    }
}

impl Filter for TransformBodyFilter {
    fn name(&self) -> &'static str {
        "transform_response_body"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut FilterContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let response = next.run(ctx, request).await;
            if !self.eligible(&response) {
                return response;
            }
            self.transform(ctx.route_id(), response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::StatusCode;
    use portico_core::{GatewayError, GatewayResult};

    #[derive(Debug)]
    struct Upper;

    impl BodyTransformer for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn transform(&self, body: &[u8]) -> GatewayResult<Bytes> {
            if body.is_empty() {
                return Err(GatewayError::document_transform("empty"));
            }
            Ok(Bytes::from(body.to_ascii_uppercase()))
        }
    }

    fn filter(max: usize) -> TransformBodyFilter {
        TransformBodyFilter::new(Arc::new(Upper), max)
    }

    async fn body_of(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_transforms_success() {
        let response = Response::json(StatusCode::OK, "abc");
        let out = filter(1024).transform("r", response).await;
        assert_eq!(out.headers().get(CONTENT_LENGTH).unwrap(), "3");
        assert_eq!(body_of(out).await, "ABC");
    }

    #[tokio::test]
    async fn test_failure_serves_original() {
        let response = Response::json(StatusCode::OK, "");
        let out = filter(1024).transform("r", response).await;
        assert_eq!(out.status(), StatusCode::OK);
        assert!(body_of(out).await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_passes_through() {
        let response = Response::json(StatusCode::OK, "abcdef");
        let out = filter(3).transform("r", response).await;
        assert_eq!(body_of(out).await, "abcdef");
    }

    #[test]
    fn test_eligibility() {
        let f = filter(1024);
        assert!(f.eligible(&Response::json(StatusCode::OK, "{}")));
        assert!(!f.eligible(&Response::json(StatusCode::NOT_FOUND, "{}")));

        let mut gzipped = Response::json(StatusCode::OK, "{}");
        gzipped
            .headers_mut()
            .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(!f.eligible(&gzipped));

        let mut large = Response::json(StatusCode::OK, "{}");
        large
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(4096_usize));
        assert!(!f.eligible(&large));
    }
}
