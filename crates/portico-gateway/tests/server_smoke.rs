//! Runs the listener on a loopback port and talks to it over TCP.

use portico_config::GatewayConfig;
use portico_gateway::{
    GatewayServer, RequestDispatcher, RouteTableHandle, ShutdownSignal, SnapshotBuilder,
};
use std::time::Duration;

fn dispatcher() -> RequestDispatcher {
    let mut config = GatewayConfig::default();
    config.gateway.host = "https://gw.example.com".to_string();
    config.services.names = vec!["orders-service".to_string()];
    config.auth.jwt_secret = "smoke".to_string();
    let snapshot = SnapshotBuilder::new(&config, None).build().unwrap();
    RequestDispatcher::new(RouteTableHandle::new(snapshot), &config.server)
}

#[tokio::test]
async fn test_serves_until_shutdown() {
    let dispatcher = dispatcher();
    let health = dispatcher.health().clone();
    let server = GatewayServer::bind("127.0.0.1:0", dispatcher, Duration::from_secs(1))
        .await
        .unwrap();
    let base = format!("http://{}", server.local_addr().unwrap());

    let shutdown = ShutdownSignal::new();
    let running = tokio::spawn(server.run(shutdown.clone()));
    let client = reqwest::Client::new();

    let mut ready = None;
    for _ in 0..50 {
        if let Ok(response) = client.get(format!("{base}/_portico/ready")).send().await {
            ready = Some(response);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let ready = ready.expect("server did not come up");
    assert_eq!(ready.status(), reqwest::StatusCode::OK);
    assert!(ready.headers().contains_key("x-request-id"));

    let index = client
        .get(format!("{base}/v3/api-docs/swagger-config"))
        .send()
        .await
        .unwrap();
    assert_eq!(index.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = index.json().await.unwrap();
    assert_eq!(body["urls"][0]["name"], "orders-service");

    let unauthorized = client
        .get(format!("{base}/v1/orders/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(health.is_draining());
    assert!(!health.is_serving());
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let first = GatewayServer::bind("127.0.0.1:0", dispatcher(), Duration::from_secs(1))
        .await
        .unwrap();
    let taken = first.local_addr().unwrap().to_string();

    let err = GatewayServer::bind(&taken, dispatcher(), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains(&taken));
}
