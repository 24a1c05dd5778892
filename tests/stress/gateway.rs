//! Gateway stress tests

use http::{Method, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tower::service_fn;
use tower_mesh_core::BackendError;
use tower_mesh_gateway::{BackendCall, BackendResponse, Gateway, Route};
use tower_mesh_loadbalancer::LoadBalanceStrategy;

use super::{InFlight, healthy_registry};

fn registry(instances: usize) -> Arc<tower_mesh_registry::ServiceRegistry> {
    Arc::new(healthy_registry("users", instances))
}

/// Test: 100k sequential requests through the full pipeline
#[tokio::test]
#[ignore]
async fn stress_sequential_dispatch() {
    let backend = service_fn(|call: BackendCall| async move {
        Ok::<_, BackendError>(BackendResponse::ok(call.instance.id().to_string()))
    });
    let gateway = Gateway::builder(registry(5))
        .route(Route::get("/api/users/:id", "users").rewrite("/users/:id"))
        .build(backend);

    let start = Instant::now();
    for i in 0..100_000 {
        let response = gateway.handle(Method::GET, &format!("/api/users/{i}")).await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let elapsed = start.elapsed();

    println!("100k requests completed in {:?}", elapsed);
    println!(
        "Throughput: {:.0} req/sec",
        100_000.0 / elapsed.as_secs_f64()
    );
}

/// Test: 10k concurrent requests, connection counts return to zero
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_concurrent_requests_release_connections() {
    let tracker = InFlight::new();
    let t = Arc::clone(&tracker);
    let backend = service_fn(move |_call: BackendCall| {
        let t = Arc::clone(&t);
        async move {
            let _slot = t.enter();
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, BackendError>(BackendResponse::ok("ok"))
        }
    });
    let gateway = Gateway::builder(registry(10))
        .route(Route::get("/api/users", "users").strategy(LoadBalanceStrategy::LeastConnections))
        .build(backend);

    let mut handles = Vec::new();
    for _ in 0..10_000 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway.handle(Method::GET, "/api/users").await.status
        }));
    }

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            ok += 1;
        }
    }

    println!("Peak concurrent backend calls: {}", tracker.peak());
    assert_eq!(ok, 10_000);
    assert_eq!(tracker.current(), 0);
    assert_eq!(gateway.load_balancer().connections().total(), 0);
}

/// Test: flapping backend, breakers never let calls through while open
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_flapping_backend() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);
    let backend = service_fn(move |_call: BackendCall| {
        let n = a.fetch_add(1, Ordering::SeqCst);
        async move {
            if (n / 50) % 2 == 0 {
                Err(BackendError::transport("flap"))
            } else {
                Ok(BackendResponse::ok("ok"))
            }
        }
    });
    let gateway = Gateway::builder(registry(3))
        .route(Route::get("/api/users", "users"))
        .circuit_breaker(
            tower_mesh_circuitbreaker::CircuitBreakerLayer::builder()
                .failure_threshold(5)
                .recovery_timeout(Duration::from_millis(5))
                .build(),
        )
        .build(backend);

    let mut statuses = std::collections::HashMap::new();
    for _ in 0..20_000 {
        let status = gateway.handle(Method::GET, "/api/users").await.status;
        *statuses.entry(status).or_insert(0usize) += 1;
    }

    println!("Status distribution: {:?}", statuses);
    println!("Backend attempts: {}", attempts.load(Ordering::SeqCst));
    assert!(statuses.contains_key(&StatusCode::OK));
    assert!(attempts.load(Ordering::SeqCst) < 20_000);
}
