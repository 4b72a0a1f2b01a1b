//! # Portico Docs
//!
//! Documentation handling for the Portico gateway.
//!
//! Backends publish their own OpenAPI documents. The gateway proxies them
//! under `/{service-id}/v3/api-docs` and rewrites each one on the way out so
//! that it points at the gateway and advertises bearer authentication:
//!
//! - [`DocRewriter`] - Rewrites `servers` and injects the `JWT` security scheme
//! - [`SwaggerConfig`] - The aggregated index served at [`SWAGGER_CONFIG_PATH`]
//! - [`SwaggerUi`] - A Swagger UI page bootstrapped from that index
//!
//! ## Example
//!
//! ```
//! use portico_docs::DocRewriter;
//!
//! let rewriter = DocRewriter::new("http://gw:8000");
//! let doc = r#"{"openapi":"3.0.1","servers":[{"url":"http://internal:9000"}],"components":{}}"#;
//! let rewritten = rewriter.rewrite(doc).unwrap();
//! assert!(rewritten.contains("http://gw:8000"));
//! ```

mod error;
mod index;
mod rewriter;
mod swagger;

pub use error::{DocsError, DocsResult};
pub use index::{service_docs_path, SwaggerConfig, SwaggerUrl, SWAGGER_CONFIG_PATH};
pub use rewriter::{DocRewriter, SECURITY_SCHEME_NAME};
pub use swagger::{SwaggerUi, DEFAULT_ASSET_BASE};

/// Path under which backends serve their OpenAPI document.
pub const API_DOCS_PATH: &str = "/v3/api-docs";
