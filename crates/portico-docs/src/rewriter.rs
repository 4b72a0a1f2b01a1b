//! OpenAPI document rewriting.
//!
//! [`DocRewriter`] makes a backend's OpenAPI document look like it was
//! published by the gateway:
//!
//! 1. every `servers[].url` becomes the gateway's public address
//! 2. a top-level `security: [{"JWT": []}]` is added when none exists
//! 3. `components.securitySchemes.JWT` is set to an HTTP bearer scheme
//!
//! The rewrite is idempotent. Documents without a `components` object are
//! rejected, and callers fall back to the original text.

use crate::error::{DocsError, DocsResult};
use bytes::Bytes;
use portico_core::{BodyTransformer, GatewayError, GatewayResult};
use serde_json::{json, Map, Value};

/// Name of the injected security scheme.
pub const SECURITY_SCHEME_NAME: &str = "JWT";

/// Rewrites backend OpenAPI documents for publication through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocRewriter {
    gateway_host: String,
}

impl DocRewriter {
    /// Creates a rewriter targeting the given public gateway address.
    pub fn new(gateway_host: impl Into<String>) -> Self {
        Self {
            gateway_host: gateway_host.into(),
        }
    }

    /// Returns the public gateway address written into `servers`.
    pub fn gateway_host(&self) -> &str {
        &self.gateway_host
    }

    /// Rewrites a parsed document in place.
    ///
    /// The document shape is checked before anything is modified, so on
    /// error `doc` is left untouched.
    pub fn rewrite_value(&self, doc: &mut Value) -> DocsResult<()> {
        let root = doc.as_object_mut().ok_or(DocsError::NotAnObject)?;

        match root.get("components") {
            Some(Value::Object(components)) => match components.get("securitySchemes") {
                None | Some(Value::Object(_)) => {}
                Some(_) => {
                    return Err(DocsError::InvalidShape {
                        field: "components.securitySchemes",
                        expected: "an object",
                    })
                }
            },
            Some(_) => {
                return Err(DocsError::InvalidShape {
                    field: "components",
                    expected: "an object",
                })
            }
            None => return Err(DocsError::MissingComponents),
        }
        if matches!(root.get("servers"), Some(v) if !v.is_array()) {
            return Err(DocsError::InvalidShape {
                field: "servers",
                expected: "an array",
            });
        }

        if let Some(Value::Array(servers)) = root.get_mut("servers") {
            tracing::debug!(servers = servers.len(), host = %self.gateway_host, "rewriting server urls");
            for server in servers.iter_mut().filter_map(Value::as_object_mut) {
                server.insert("url".to_string(), Value::String(self.gateway_host.clone()));
            }
        }

        if !root.contains_key("security") {
            root.insert(
                "security".to_string(),
                json!([{ SECURITY_SCHEME_NAME: [] }]),
            );
        }

        if let Some(Value::Object(components)) = root.get_mut("components") {
            let schemes = components
                .entry("securitySchemes")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(schemes) = schemes {
                schemes.insert(SECURITY_SCHEME_NAME.to_string(), bearer_scheme());
            }
        }

        Ok(())
    }

    /// Parses, rewrites and pretty-prints a document.
    pub fn rewrite(&self, text: &str) -> DocsResult<String> {
        let mut doc: Value = serde_json::from_str(text).map_err(DocsError::Parse)?;
        self.rewrite_value(&mut doc)?;
        serde_json::to_string_pretty(&doc).map_err(DocsError::Serialization)
    }
}

impl BodyTransformer for DocRewriter {
    fn name(&self) -> &'static str {
        "doc-rewriter"
    }

    fn transform(&self, body: &[u8]) -> GatewayResult<Bytes> {
        let text = std::str::from_utf8(body)
            .map_err(|_| GatewayError::document_transform(DocsError::NotUtf8.to_string()))?;
        self.rewrite(text)
            .map(Bytes::from)
            .map_err(|e| GatewayError::document_transform(e.to_string()))
    }
}

fn bearer_scheme() -> Value {
    json!({
        "type": "http",
        "name": SECURITY_SCHEME_NAME,
        "scheme": "bearer",
        "bearerFormat": "JWT",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rewriter() -> DocRewriter {
        DocRewriter::new("http://gw:8000")
    }

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_rewrites_servers_and_adds_scheme() {
        let doc = r#"{
            "openapi": "3.0.1",
            "servers": [{"url": "http://internal:9000", "description": "Generated server url"}],
            "paths": {},
            "components": {"schemas": {"Order": {"type": "object"}}}
        }"#;

        let out = parse(&rewriter().rewrite(doc).unwrap());

        assert_eq!(out["servers"][0]["url"], "http://gw:8000");
        assert_eq!(out["servers"][0]["description"], "Generated server url");
        assert_eq!(out["security"], json!([{"JWT": []}]));
        assert_eq!(
            out["components"]["securitySchemes"]["JWT"],
            json!({"type": "http", "name": "JWT", "scheme": "bearer", "bearerFormat": "JWT"})
        );
        assert_eq!(out["components"]["schemas"]["Order"]["type"], "object");
    }

    #[test]
    fn test_every_server_entry_is_rewritten() {
        let doc = r#"{"servers":[{"url":"http://a"},{"url":"http://b"},{}],"components":{}}"#;
        let out = parse(&rewriter().rewrite(doc).unwrap());
        for server in out["servers"].as_array().unwrap() {
            assert_eq!(server["url"], "http://gw:8000");
        }
    }

    #[test]
    fn test_no_servers_key_is_not_created() {
        let out = parse(&rewriter().rewrite(r#"{"components":{}}"#).unwrap());
        assert!(out.get("servers").is_none());
    }

    #[test]
    fn test_existing_security_is_kept() {
        let doc = r#"{"security":[{"oauth":["read"]}],"components":{}}"#;
        let out = parse(&rewriter().rewrite(doc).unwrap());
        assert_eq!(out["security"], json!([{"oauth": ["read"]}]));
    }

    #[test]
    fn test_existing_jwt_scheme_is_overwritten() {
        let doc = r#"{"components":{"securitySchemes":{"JWT":{"type":"apiKey"},"other":{"type":"http"}}}}"#;
        let out = parse(&rewriter().rewrite(doc).unwrap());
        assert_eq!(out["components"]["securitySchemes"]["JWT"]["scheme"], "bearer");
        assert_eq!(out["components"]["securitySchemes"]["other"]["type"], "http");
    }

    #[test]
    fn test_missing_components_is_rejected() {
        let doc = r#"{"servers":[{"url":"http://internal:9000"}]}"#;
        assert!(matches!(
            rewriter().rewrite(doc),
            Err(DocsError::MissingComponents)
        ));
    }

    #[test]
    fn test_failed_shape_check_leaves_value_untouched() {
        let mut doc = json!({"servers": [{"url": "http://a"}], "components": []});
        let before = doc.clone();
        assert!(rewriter().rewrite_value(&mut doc).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_malformed_input_is_reported() {
        let text = "<html>not json</html>";
        assert!(matches!(rewriter().rewrite(text), Err(DocsError::Parse(_))));
        assert!(matches!(rewriter().rewrite("[1,2]"), Err(DocsError::NotAnObject)));
        assert!(matches!(
            rewriter().rewrite(r#"{"servers":"x","components":{}}"#),
            Err(DocsError::InvalidShape { field: "servers", .. })
        ));
    }

    #[test]
    fn test_body_transformer_reports_failures() {
        let ok = rewriter().transform(br#"{"components":{}}"#).unwrap();
        assert!(std::str::from_utf8(&ok).unwrap().contains("bearer"));

        let err = rewriter().transform(b"{").unwrap_err();
        assert!(matches!(err, GatewayError::DocumentTransform { .. }));

        let err = rewriter().transform(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, GatewayError::DocumentTransform { .. }));
    }

    #[test]
    fn test_rewrite_twice_is_stable() {
        let doc = r#"{"servers":[{"url":"http://internal:9000"}],"components":{"securitySchemes":{}}}"#;
        let once = rewriter().rewrite(doc).unwrap();
        let twice = rewriter().rewrite(&once).unwrap();
        assert_eq!(parse(&once), parse(&twice));
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(
            urls in proptest::collection::vec("[a-z]{1,8}", 0..4),
            has_security in any::<bool>(),
            schema_names in proptest::collection::vec("[A-Z][a-z]{1,6}", 0..3),
        ) {
            let servers: Vec<Value> = urls.iter().map(|u| json!({"url": format!("http://{u}")})).collect();
            let schemas: Map<String, Value> = schema_names
                .iter()
                .map(|n| (n.clone(), json!({"type": "object"})))
                .collect();
            let mut doc = json!({"openapi": "3.0.1", "servers": servers, "components": {"schemas": schemas}});
            if has_security {
                doc["security"] = json!([{"basic": []}]);
            }

            let once = rewriter().rewrite(&doc.to_string()).unwrap();
            let twice = rewriter().rewrite(&once).unwrap();
            let (once, twice) = (parse(&once), parse(&twice));
            prop_assert_eq!(&once["servers"], &twice["servers"]);
            prop_assert_eq!(&once["components"]["securitySchemes"], &twice["components"]["securitySchemes"]);
            prop_assert_eq!(&once["security"], &twice["security"]);
        }
    }
}
