use super::{registry_with, MockBackend};
use bytes::Bytes;
use http::header::HeaderName;
use http::{HeaderValue, Method, StatusCode};
use std::sync::Arc;
use tower_mesh_gateway::{Gateway, GatewayRequest, Route, RouteSpec};
use tower_mesh_loadbalancer::LoadBalanceStrategy;
use tower_mesh_registry::{ServiceInstance, ServiceRegistry};

#[tokio::test]
async fn rewrite_substitutes_params_and_keeps_query() {
    let backend = MockBackend::new();
    let gateway = Gateway::builder(registry_with("users", &["users-1"]))
        .route(Route::get("/api/users/:id/orders/:order", "users").rewrite("/internal/:id/:order"))
        .build(backend.clone());

    let response = gateway
        .handle(Method::GET, "/api/users/7/orders/99?expand=items")
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let call = backend.last_call().unwrap();
    assert_eq!(call.request.path, "/internal/7/99");
    assert_eq!(call.request.query.as_deref(), Some("expand=items"));
    assert_eq!(call.request.params.get("id"), Some("7"));
    assert_eq!(call.request.params.get("order"), Some("99"));
    assert_eq!(call.url(), "http://127.0.0.1:9000/internal/7/99?expand=items");
}

#[tokio::test]
async fn headers_and_body_pass_through() {
    let backend = MockBackend::new();
    let gateway = Gateway::builder(registry_with("orders", &["orders-1"]))
        .route(Route::post("/api/orders", "orders"))
        .build(backend.clone());

    let request = GatewayRequest::new(Method::POST, "/api/orders")
        .with_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("abc-123"),
        )
        .with_body(Bytes::from_static(b"{\"sku\":\"A1\"}"));
    let response = gateway.call_request(request).await;
    assert_eq!(response.status, StatusCode::OK);

    let call = backend.last_call().unwrap();
    assert_eq!(call.request.method, Method::POST);
    assert_eq!(call.request.headers.get("x-request-id").unwrap(), "abc-123");
    assert_eq!(call.request.body, Bytes::from_static(b"{\"sku\":\"A1\"}"));
}

#[tokio::test]
async fn first_matching_route_wins() {
    let registry = Arc::new(ServiceRegistry::default());
    for (id, service) in [("profile-1", "profile"), ("users-1", "users")] {
        registry.register(ServiceInstance::new(id, service, "127.0.0.1", 9100));
        registry.heartbeat(id).unwrap();
    }

    let gateway = Gateway::builder(registry)
        .route(Route::get("/api/users/me", "profile"))
        .route(Route::get("/api/users/:id", "users"))
        .build(MockBackend::new());

    let me = gateway.handle(Method::GET, "/api/users/me").await;
    assert_eq!(me.served_by.as_deref(), Some("profile-1"));

    let other = gateway.handle(Method::GET, "/api/users/42").await;
    assert_eq!(other.served_by.as_deref(), Some("users-1"));
}

#[tokio::test]
async fn version_filter_restricts_instances() {
    let registry = Arc::new(ServiceRegistry::default());
    registry.register(ServiceInstance::new("users-v1", "users", "127.0.0.1", 9001).with_version("v1"));
    registry.register(ServiceInstance::new("users-v2", "users", "127.0.0.1", 9002).with_version("v2"));
    registry.heartbeat("users-v1").unwrap();
    registry.heartbeat("users-v2").unwrap();

    let gateway = Gateway::builder(registry)
        .route(Route::get("/v2/users/:id", "users").version("v2").rewrite("/users/:id"))
        .build(MockBackend::new());

    for _ in 0..4 {
        let response = gateway.handle(Method::GET, "/v2/users/1").await;
        assert_eq!(response.served_by.as_deref(), Some("users-v2"));
    }
}

#[tokio::test]
async fn least_connections_route_avoids_busy_instance() {
    let gateway = Gateway::builder(registry_with("users", &["a", "b", "c"]))
        .route(Route::get("/x", "users").strategy(LoadBalanceStrategy::LeastConnections))
        .build(MockBackend::new());

    let connections = gateway.load_balancer().connections();
    connections.set("a", 3);
    connections.set("b", 1);
    connections.set("c", 2);

    let response = gateway.handle(Method::GET, "/x").await;
    assert_eq!(response.served_by.as_deref(), Some("b"));
    // The guard released b's slot when the call finished.
    assert_eq!(connections.count("b"), 1);
}

#[tokio::test]
async fn custom_served_by_header() {
    let gateway = Gateway::builder(registry_with("users", &["users-1"]))
        .route(Route::get("/x", "users"))
        .served_by_header(HeaderName::from_static("x-upstream-instance"))
        .build(MockBackend::new());

    let response = gateway.handle(Method::GET, "/x").await;
    assert_eq!(response.headers.get("x-upstream-instance").unwrap(), "users-1");
    assert!(response.headers.get("x-served-by").is_none());
}

#[tokio::test]
async fn routes_from_declarative_specs() {
    let specs = vec![
        RouteSpec {
            method: "get".into(),
            path: "/api/users/:id".into(),
            service: "users".into(),
            rewrite: Some("/users/:id".into()),
            ..RouteSpec::default()
        },
        RouteSpec {
            method: "post".into(),
            path: "/api/users".into(),
            service: "users".into(),
            auth_required: true,
            ..RouteSpec::default()
        },
    ];
    let routes: Vec<Route> = specs
        .into_iter()
        .map(Route::try_from)
        .collect::<Result<_, _>>()
        .unwrap();

    let backend = MockBackend::new();
    let gateway = Gateway::builder(registry_with("users", &["users-1"]))
        .routes(routes)
        .authenticator(|_: &GatewayRequest| false)
        .build(backend.clone());

    assert_eq!(gateway.handle(Method::GET, "/api/users/5").await.status, StatusCode::OK);
    assert_eq!(backend.last_call().unwrap().request.path, "/users/5");
    assert_eq!(
        gateway.handle(Method::POST, "/api/users").await.status,
        StatusCode::UNAUTHORIZED
    );
}
