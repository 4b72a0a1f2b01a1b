//! End-to-end tests running compiled route chains against a fake upstream.

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use jsonwebtoken::{encode, EncodingKey, Header};
use portico_core::{RequestId, RoleRegistry, ServiceCatalog};
use portico_filters::auth::{JwtSettings, JwtVerifier, MemoryTokenStore};
use portico_filters::stages::AUTH_SUBJECT_HEADER;
use portico_filters::{
    BoxFuture, ChainResources, FilterChain, FilterContext, Request, Response, ResponseExt,
};
use portico_router::{RouteTable, RouteTableBuilder};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const SECRET: &str = "e2e-secret";

fn table() -> RouteTable {
    let catalog = ServiceCatalog::new(["orders-service", "users-service"]).unwrap();
    let roles = RoleRegistry::new(["ROLE_ADMIN"], ["ROLE_SELLER"], ["ROLE_MEMBER"]);
    RouteTableBuilder::new(&catalog, &roles)
        .gateway_host("https://gw.example.com")
        .build()
        .unwrap()
}

fn resources(store: Option<Arc<MemoryTokenStore>>) -> ChainResources {
    let mut verifier = JwtVerifier::new(&JwtSettings {
        secret: SECRET.to_string(),
        ..JwtSettings::default()
    });
    if let Some(store) = store {
        verifier = verifier.with_store(store);
    }
    ChainResources::new(Arc::new(verifier))
}

fn token(roles: &[&str], jti: &str) -> String {
    let claims = json!({
        "sub": "alice",
        "exp": chrono::Utc::now().timestamp() + 600,
        "roles": roles,
        "jti": jti,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, uri: &str, bearer: Option<&str>) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

/// Records calls and echoes the forwarded path and subject.
#[derive(Clone, Default)]
struct FakeUpstream {
    calls: Arc<AtomicUsize>,
    body: Option<&'static str>,
}

impl FakeUpstream {
    fn serving(body: &'static str) -> Self {
        Self {
            calls: Arc::default(),
            body: Some(body),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn terminal(&self) -> impl FnOnce(&mut FilterContext, Request) -> BoxFuture<'static, Response> + Send {
        let upstream = self.clone();
        move |_ctx: &mut FilterContext, req: Request| {
            upstream.calls.fetch_add(1, Ordering::SeqCst);
            let body = match upstream.body {
                Some(body) => body.to_string(),
                None => json!({
                    "path": req.uri().path(),
                    "query": req.uri().query(),
                    "subject": req
                        .headers()
                        .get(AUTH_SUBJECT_HEADER)
                        .and_then(|v| v.to_str().ok()),
                })
                .to_string(),
            };
            Box::pin(async move { Response::json(StatusCode::OK, body) })
        }
    }
}

async fn run(
    table: &RouteTable,
    resources: &ChainResources,
    req: Request,
    upstream: &FakeUpstream,
) -> (FilterContext, Response) {
    let matched = table.lookup(req.uri().path()).unwrap();
    let chain = FilterChain::compile(matched.rule, resources);
    let mut ctx = FilterContext::new(RequestId::new(), matched.rule.id());
    let response = chain.run(&mut ctx, req, upstream.terminal()).await;
    (ctx, response)
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_admin_route_forwards_with_subject() {
    let table = table();
    let upstream = FakeUpstream::default();
    let req = request(
        Method::GET,
        "/v1/admin/orders/42?verbose=true",
        Some(&token(&["ROLE_ADMIN"], "a")),
    );

    let (ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(ctx.auth().unwrap().subject(), "alice");
    let body = json_body(response).await;
    assert_eq!(body["path"], "/v1/admin/orders/42");
    assert_eq!(body["query"], "verbose=true");
    assert_eq!(body["subject"], "alice");
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden_and_not_forwarded() {
    let table = table();
    let upstream = FakeUpstream::default();
    let req = request(
        Method::GET,
        "/v1/admin/orders/42",
        Some(&token(&["ROLE_MEMBER"], "m")),
    );

    let (ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().contains_key("access-control-allow-methods"));
    assert!(ctx.rejection().is_some());
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "ACCESS_DENIED");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let table = table();
    let upstream = FakeUpstream::default();
    let req = request(Method::POST, "/v1/orders/1", None);

    let (_ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["reason"], "missing_token");
    assert!(body["request_id"].is_string());
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_default_route_accepts_any_valid_token() {
    let table = table();
    let upstream = FakeUpstream::default();
    let req = request(Method::GET, "/v1/users/profile", Some(&token(&[], "n")));

    let (ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(ctx.route_id(), "users-service-default-routes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["path"], "/v1/users/profile");
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let table = table();
    let store = Arc::new(MemoryTokenStore::new());
    store.revoke("revoked-jti");
    let upstream = FakeUpstream::default();
    let req = request(
        Method::GET,
        "/v1/seller/orders/1",
        Some(&token(&["ROLE_SELLER"], "revoked-jti")),
    );

    let (_ctx, response) = run(&table, &resources(Some(store)), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["reason"], "revoked_token");
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_docs_route_rewrites_path_and_document() {
    let table = table();
    let upstream = FakeUpstream::serving(
        r#"{"openapi":"3.0.1","servers":[{"url":"http://10.0.0.7:8080"}],"paths":{},"components":{}}"#,
    );
    let req = request(
        Method::GET,
        "/orders-service/v3/api-docs",
        Some(&token(&[], "d")),
    );

    let (_ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["servers"][0]["url"], "https://gw.example.com");
    assert_eq!(body["security"], json!([{"JWT": []}]));
    assert_eq!(body["components"]["securitySchemes"]["JWT"]["scheme"], "bearer");
}

#[tokio::test]
async fn test_docs_route_serves_unrecognized_document_unchanged() {
    let table = table();
    let upstream = FakeUpstream::serving(r#"{"swagger":"2.0"}"#);
    let req = request(
        Method::GET,
        "/orders-service/v3/api-docs",
        Some(&token(&[], "d")),
    );

    let (_ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"swagger": "2.0"}));
}

#[tokio::test]
async fn test_swagger_index_needs_no_token() {
    let table = table();
    let upstream = FakeUpstream::serving("{}");
    let req = request(Method::GET, "/v3/api-docs/swagger-config", None);

    let (ctx, response) = run(&table, &resources(None), req, &upstream).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(ctx.auth().is_none());
    assert_eq!(upstream.calls(), 1);
}
