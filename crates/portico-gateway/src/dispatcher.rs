//! Per-request dispatch.
//!
//! For every inbound request the dispatcher:
//!
//! 1. assigns a request id (an inbound UUID `x-request-id` is kept)
//! 2. answers internal endpoints (`/_portico/*`, `/swagger-ui.html`)
//! 3. refuses paths with `.` or `..` segments (400), then matches the path
//!    against the live route table (404 if nothing matches)
//! 4. answers CORS preflight for the matched route
//! 5. buffers the body up to `server.max_body_size` (413 beyond it)
//! 6. runs the route's filter chain under the request deadline (504 when it
//!    elapses), ending in the backend call or the local swagger-config index
//! 7. echoes `x-request-id` and records metrics

use crate::headers::{request_id_from, set_request_id, strip_reserved, ForwardedInfo};
use crate::health::HealthChecker;
use crate::state::{RouteSnapshot, RouteTableHandle};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use portico_config::ServerConfig;
use portico_core::{GatewayError, RequestId};
use portico_filters::{BoxFuture, FilterContext, Request, Response, ResponseExt, Terminal};
use portico_router::{has_dot_segment, RouteKind, RouteRule};
use portico_telemetry::metrics::{record_request, InFlightGuard};
use portico_telemetry::MetricsRegistry;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Prefix of the gateway's own endpoints.
pub const INTERNAL_PREFIX: &str = "/_portico/";

/// Path of the Swagger UI page.
pub const SWAGGER_UI_PATH: &str = "/swagger-ui.html";

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Routes inbound requests through the live route table.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    routes: RouteTableHandle,
    health: Arc<HealthChecker>,
    metrics: Option<MetricsRegistry>,
    max_body_size: usize,
    request_timeout: Duration,
}

impl RequestDispatcher {
    /// Creates a dispatcher using the body limit and deadline from `server`.
    pub fn new(routes: RouteTableHandle, server: &ServerConfig) -> Self {
        Self {
            routes,
            health: Arc::new(HealthChecker::new()),
            metrics: None,
            max_body_size: server.max_body_size,
            request_timeout: Duration::from_millis(server.request_timeout_ms),
        }
    }

    /// Serves `registry` at `/_portico/metrics`.
    pub fn with_metrics(mut self, registry: Option<MetricsRegistry>) -> Self {
        self.metrics = registry;
        self
    }

    /// Returns the health checker.
    pub fn health(&self) -> &Arc<HealthChecker> {
        &self.health
    }

    /// Returns the route table handle.
    pub fn routes(&self) -> &RouteTableHandle {
        &self.routes
    }

    /// Handles one request from `peer`. Never fails; every error becomes a
    /// response.
    pub async fn handle<B>(&self, request: http::Request<B>, peer: SocketAddr) -> Response
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let _in_flight = InFlightGuard::new();
        let request_id = request_id_from(request.headers());
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            peer = %peer,
            route_id = tracing::field::Empty,
        );

        async move {
            let (route, mut response) = self.route(request, request_id, peer).await;
            set_request_id(response.headers_mut(), request_id);

            let elapsed = started.elapsed();
            record_request(&route, response.status().as_u16(), elapsed);
            tracing::info!(
                status = response.status().as_u16(),
                duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "request completed"
            );
            response
        }
        .instrument(span)
        .await
    }

    /// Returns the metrics label and the response.
    async fn route<B>(
        &self,
        request: http::Request<B>,
        request_id: RequestId,
        peer: SocketAddr,
    ) -> (String, Response)
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = request.uri().path().to_string();
        let snapshot = self.routes.load();

        if let Some(response) = self.internal(&path, &snapshot) {
            return ("internal".to_string(), response);
        }

        if has_dot_segment(&path) {
            tracing::info!("dot segment in request path");
            let err = GatewayError::invalid_path(&path);
            return ("invalid".to_string(), error_response(&err, request_id));
        }

        let Some((matched, chain)) = snapshot.lookup(&path) else {
            tracing::debug!("no route matched");
            let err = GatewayError::no_route(&path);
            return ("none".to_string(), error_response(&err, request_id));
        };
        let rule = matched.rule;
        let route_id = rule.id().to_string();
        tracing::Span::current().record("route_id", route_id.as_str());

        if request.method() == Method::OPTIONS {
            return (route_id, chain.preflight());
        }

        let request = match self.buffer(request).await {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "request body rejected");
                let mut response = error_response(&err, request_id);
                chain.decorate(&mut response);
                return (route_id, response);
            }
        };

        let forwarded = ForwardedInfo::new(peer, request.headers());
        let terminal = terminal(&snapshot, rule, forwarded);
        let mut ctx = FilterContext::new(request_id, route_id.clone())
            .conceal_forbidden(snapshot.conceal_forbidden());

        let response =
            match tokio::time::timeout(self.request_timeout, chain.run(&mut ctx, request, terminal))
                .await
            {
                Ok(response) => response,
                Err(_) => {
                    let err = GatewayError::DeadlineExceeded {
                        timeout_ms: u64::try_from(self.request_timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    };
                    tracing::warn!(error = %err, "request deadline elapsed");
                    let mut response = error_response(&err, request_id);
                    chain.decorate(&mut response);
                    response
                }
            };

        if let Some(rejection) = ctx.rejection() {
            tracing::info!(error = %rejection, "request rejected");
        }
        (route_id, response)
    }

    /// Buffers the body within the size limit and drops reserved headers.
    async fn buffer<B>(&self, request: http::Request<B>) -> Result<Request, GatewayError>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let limit = self.max_body_size;
        let declared = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let (mut parts, body) = request.into_parts();
        strip_reserved(&mut parts.headers);

        let bytes = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            Err(e) => {
                return Err(GatewayError::internal(format!(
                    "failed to read request body: {e}"
                )));
            }
        };

        Ok(http::Request::from_parts(parts, Full::new(bytes)))
    }

    fn internal(&self, path: &str, snapshot: &RouteSnapshot) -> Option<Response> {
        if path == SWAGGER_UI_PATH {
            let mut response = http::Response::new(Full::new(snapshot.swagger_ui()));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            return Some(response);
        }

        let endpoint = path.strip_prefix(INTERNAL_PREFIX)?;
        let response = match endpoint {
            "health" => json_response(StatusCode::OK, &self.health.liveness()),
            "ready" => {
                let readiness = self.health.readiness(snapshot);
                let status = if readiness.ready {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json_response(status, &readiness)
            }
            "routes" => {
                let rules: Vec<&RouteRule> = snapshot.table().iter().collect();
                json_response(StatusCode::OK, &rules)
            }
            "metrics" => match &self.metrics {
                Some(registry) => {
                    let mut response = http::Response::new(Full::new(Bytes::from(registry.render())));
                    response
                        .headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static(METRICS_CONTENT_TYPE));
                    response
                }
                None => Response::from_error(&GatewayError::no_route(path), None),
            },
            _ => Response::from_error(&GatewayError::no_route(path), None),
        };
        Some(response)
    }
}

/// The last step of a route's chain.
///
/// The swagger-config singleton is answered from the catalog; every other
/// route goes to its backend.
fn terminal(snapshot: &RouteSnapshot, rule: &RouteRule, forwarded: ForwardedInfo) -> Terminal<'static> {
    if rule.kind() == RouteKind::SwaggerIndex {
        let index = snapshot.swagger_config();
        return Box::new(
            move |_ctx: &mut FilterContext, _request: Request| -> BoxFuture<'static, Response> {
                Box::pin(async move { Response::json(StatusCode::OK, index) })
            },
        );
    }

    let upstream = snapshot.upstream();
    let target = rule.target().to_string();
    Box::new(move |ctx: &mut FilterContext, mut request: Request| -> BoxFuture<'static, Response> {
        let request_id = ctx.request_id();
        forwarded.apply(request.headers_mut(), request_id);
        Box::pin(async move {
            match upstream.dispatch(&target, request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(upstream = %target, error = %err, "upstream dispatch failed");
                    error_response(&GatewayError::from(err), request_id)
                }
            }
        })
    })
}

fn error_response(err: &GatewayError, request_id: RequestId) -> Response {
    Response::from_error(err, Some(&request_id.to_string()))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response {
    let body = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::json(status, body)
}
