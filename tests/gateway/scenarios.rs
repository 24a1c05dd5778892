use super::{init_tracing, registry_with, MockBackend};
use http::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower_mesh_gateway::{Gateway, GatewayRequest, Route};
use tower_mesh_ratelimiter::RateLimit;
use tower_mesh_registry::ServiceRegistry;

fn user_route() -> Route {
    Route::get("/api/users/:id", "user-service")
}

#[tokio::test]
async fn healthy_instance_serves_request_tagged_with_its_id() {
    init_tracing();
    let backend = MockBackend::new();
    let gateway = Gateway::builder(registry_with("user-service", &["user-1"]))
        .route(user_route())
        .build(backend.clone());

    let response = gateway.handle(Method::GET, "/api/users/42").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_text(), "user-1 GET /api/users/42");
    assert_eq!(response.served_by.as_deref(), Some("user-1"));
    assert_eq!(response.headers.get("x-served-by").unwrap(), "user-1");
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn no_healthy_instances_is_service_unavailable_without_hanging() {
    init_tracing();
    let backend = MockBackend::new();
    let gateway = Gateway::builder(Arc::new(ServiceRegistry::default()))
        .route(user_route())
        .build(backend.clone());

    let response = tokio::time::timeout(
        Duration::from_secs(1),
        gateway.handle(Method::GET, "/api/users/42"),
    )
    .await
    .expect("gateway must answer immediately when nothing is healthy");

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.body_text().contains("service unavailable"));
    assert!(response.served_by.is_none());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn open_breaker_on_sole_instance_is_circuit_open_with_zero_backend_calls() {
    init_tracing();
    let backend = MockBackend::new();
    let gateway = Gateway::builder(registry_with("user-service", &["user-1"]))
        .route(user_route())
        .build(backend.clone());

    gateway.circuit_breaker_or_create("user-1").force_open();

    for _ in 0..3 {
        let response = gateway.handle(Method::GET, "/api/users/42").await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.body_text().contains("circuit open"));
    }
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn third_request_in_window_is_rate_limited() {
    init_tracing();
    let backend = MockBackend::new();
    let gateway = Gateway::builder(registry_with("user-service", &["user-1"]))
        .route(user_route().rate_limit(RateLimit::new(2, Duration::from_secs(60))))
        .build(backend.clone());

    let request = || GatewayRequest::new(Method::GET, "/api/users/42").with_client("203.0.113.7");

    assert_eq!(gateway.call_request(request()).await.status, StatusCode::OK);
    assert_eq!(gateway.call_request(request()).await.status, StatusCode::OK);

    let third = gateway.call_request(request()).await;
    assert_eq!(third.status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = third
        .headers
        .get(http::header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(backend.call_count(), 2);
}
