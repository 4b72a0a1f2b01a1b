//! Backend dispatch.
//!
//! Routes name their backend with a logical target, `lb://{service}`. A
//! [`ServiceResolver`] turns that into a concrete base URL and an
//! [`UpstreamDispatcher`] sends the request there.

use crate::error::UpstreamError;
use crate::headers::strip_hop_by_hop;
use bytes::{Bytes, BytesMut};
use http::header::CONTENT_LENGTH;
use http_body_util::{BodyExt, Full};
use portico_config::UpstreamConfig;
use portico_filters::{BoxFuture, Request, Response};
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scheme of load-balanced logical targets.
pub const LB_SCHEME: &str = "lb://";

/// Maps a logical target to a backend base URL.
pub trait ServiceResolver: Send + Sync + std::fmt::Debug {
    /// Returns the base URL (no trailing slash) to send the next request to.
    fn resolve(&self, target: &str) -> Result<String, UpstreamError>;
}

#[derive(Debug)]
struct Instances {
    urls: Vec<String>,
    next: AtomicUsize,
}

/// Resolver backed by a fixed instance list per service.
///
/// Service names match case-insensitively, with `_` and `-` treated alike so
/// `PORTICO__UPSTREAM__SERVICES__ORDERS_SERVICE` serves `orders-service`.
/// Instances are used round-robin.
/// Absolute `http://` and `https://` targets pass through unchanged.
#[derive(Debug, Default)]
pub struct StaticResolver {
    services: HashMap<String, Instances>,
}

impl StaticResolver {
    /// Creates a resolver from `service name -> base URLs`.
    pub fn new(services: &BTreeMap<String, Vec<String>>) -> Self {
        let services = services
            .iter()
            .map(|(name, urls)| {
                let urls = urls
                    .iter()
                    .map(|u| u.trim().trim_end_matches('/').to_string())
                    .filter(|u| !u.is_empty())
                    .collect();
                (
                    service_key(name),
                    Instances {
                        urls,
                        next: AtomicUsize::new(0),
                    },
                )
            })
            .collect();
        Self { services }
    }
}

impl ServiceResolver for StaticResolver {
    fn resolve(&self, target: &str) -> Result<String, UpstreamError> {
        if let Some(service) = target.strip_prefix(LB_SCHEME) {
            let instances = self
                .services
                .get(&service_key(service))
                .filter(|i| !i.urls.is_empty())
                .ok_or_else(|| UpstreamError::NoInstances {
                    target: target.to_string(),
                })?;
            let n = instances.next.fetch_add(1, Ordering::Relaxed);
            return Ok(instances.urls[n % instances.urls.len()].clone());
        }

        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(target.trim_end_matches('/').to_string());
        }

        Err(UpstreamError::UnsupportedTarget {
            target: target.to_string(),
        })
    }
}

fn service_key(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

/// Sends a request to a logical target.
pub trait UpstreamDispatcher: Send + Sync + std::fmt::Debug {
    /// Forwards `request` to `target`.
    ///
    /// The request URI carries the path and query to use upstream; its
    /// headers are forwarded as given.
    fn dispatch<'a>(
        &'a self,
        target: &'a str,
        request: Request,
    ) -> BoxFuture<'a, Result<Response, UpstreamError>>;
}

/// [`UpstreamDispatcher`] over a pooled `reqwest` client.
///
/// Response bodies are buffered up to `max_response_bytes`; a larger body
/// fails with [`UpstreamError::ResponseTooLarge`].
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    resolver: Arc<dyn ServiceResolver>,
    max_response_bytes: usize,
}

impl HttpUpstream {
    /// Creates a dispatcher.
    ///
    /// Redirects are returned to the caller, not followed.
    pub fn new(
        resolver: Arc<dyn ServiceResolver>,
        connect_timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(100)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            resolver,
            max_response_bytes,
        })
    }

    /// Creates a dispatcher with a [`StaticResolver`] over `config.services`.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        Self::new(
            Arc::new(StaticResolver::new(&config.services)),
            Duration::from_millis(config.connect_timeout_ms),
            config.max_response_bytes,
        )
    }

    async fn forward(&self, target: &str, request: Request) -> Result<Response, UpstreamError> {
        let base = self.resolver.resolve(target)?;
        let (parts, body) = request.into_parts();
        let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let url = format!("{base}{path_and_query}");

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let mut builder = self.client.request(parts.method, &url).headers(parts.headers);
        if !body.is_empty() {
            builder = builder.body(body);
        }

        tracing::debug!(upstream = %target, url = %url, "forwarding request");
        let upstream = builder
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(target, &e))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        let body = self.read_body(target, upstream).await?;

        strip_hop_by_hop(&mut headers);
        headers.remove(CONTENT_LENGTH);

        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    async fn read_body(
        &self,
        target: &str,
        mut upstream: reqwest::Response,
    ) -> Result<Bytes, UpstreamError> {
        let limit = self.max_response_bytes;
        let too_large = || UpstreamError::ResponseTooLarge {
            target: target.to_string(),
            limit,
        };

        let declared = upstream.content_length().and_then(|n| usize::try_from(n).ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(too_large());
        }

        let mut body = BytesMut::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = upstream
            .chunk()
            .await
            .map_err(|e| UpstreamError::from_reqwest(target, &e))?
        {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

impl UpstreamDispatcher for HttpUpstream {
    fn dispatch<'a>(
        &'a self,
        target: &'a str,
        request: Request,
    ) -> BoxFuture<'a, Result<Response, UpstreamError>> {
        Box::pin(self.forward(target, request))
    }
}
