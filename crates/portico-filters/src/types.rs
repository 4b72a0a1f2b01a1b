//! HTTP types used throughout the filter chain.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use portico_core::GatewayError;

/// The HTTP request type used in the filter chain.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the filter chain.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building gateway responses.
pub trait ResponseExt {
    /// Creates an empty response with the given status.
    fn empty(status: StatusCode) -> Response;

    /// Creates a JSON response.
    fn json(status: StatusCode, body: impl Into<Bytes>) -> Response;

    /// Renders a gateway error as a JSON envelope.
    fn from_error(error: &GatewayError, request_id: Option<&str>) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn json(status: StatusCode, body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    fn from_error(error: &GatewayError, request_id: Option<&str>) -> Response {
        let body = serde_json::to_vec(&error.to_envelope(request_id)).unwrap_or_default();
        Self::json(error.status_code(), body)
    }
}
