use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_mesh_circuitbreaker::{
    CircuitBreakerError, CircuitBreakerEvent, CircuitBreakerLayer, CircuitState,
};
use tower_mesh_core::MeshEvent;

#[tokio::test]
async fn layer_guards_a_tower_service() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let inner = tower::service_fn(move |fail: bool| {
        c.fetch_add(1, Ordering::SeqCst);
        async move {
            if fail {
                Err("upstream error")
            } else {
                Ok("ok")
            }
        }
    });

    let mut service = ServiceBuilder::new()
        .layer(
            CircuitBreakerLayer::builder()
                .name("orders")
                .failure_threshold(2)
                .build(),
        )
        .service(inner);

    assert_eq!(service.ready().await.unwrap().call(false).await, Ok("ok"));
    for _ in 0..2 {
        let err = service.ready().await.unwrap().call(true).await.unwrap_err();
        assert_eq!(err, CircuitBreakerError::Inner("upstream error"));
    }

    assert_eq!(service.breaker().state(), CircuitState::Open);
    let err = service.ready().await.unwrap().call(false).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn minted_breakers_share_settings_but_not_state() {
    let template = CircuitBreakerLayer::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(60))
        .build();

    let a = template.new_breaker("users-1");
    let b = template.new_breaker("users-2");
    let _ = a.execute(|| async { Err::<(), _>("boom") }).await;

    assert_eq!(a.name(), "users-1");
    assert_eq!(b.config().failure_threshold(), 1);
    assert!(a.is_open());
    assert!(!b.is_open());
}

#[tokio::test]
async fn events_carry_the_breaker_name() {
    let seen: Arc<Mutex<Vec<(String, &'static str)>>> = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let template = CircuitBreakerLayer::builder()
        .failure_threshold(1)
        .on_event(move |event: &CircuitBreakerEvent| {
            s.lock()
                .unwrap()
                .push((event.source().to_string(), event.event_type()));
        })
        .build();

    let breaker = template.new_breaker("payments-3");
    let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
    let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;

    let seen = seen.lock().unwrap();
    assert!(seen.iter().all(|(source, _)| source == "payments-3"));
    let kinds: Vec<&str> = seen.iter().map(|(_, kind)| *kind).collect();
    assert_eq!(
        kinds,
        vec!["call_permitted", "failure_recorded", "state_transition", "call_rejected"]
    );
}

#[tokio::test]
async fn manual_control_and_health_reporting() {
    let breaker = CircuitBreakerLayer::builder().build().breaker();
    assert_eq!(breaker.http_status(), 200);
    assert_eq!(breaker.health_status(), "healthy");

    breaker.force_open();
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.http_status(), 503);

    breaker.force_closed();
    assert_eq!(breaker.state(), CircuitState::Closed);

    let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
    assert_eq!(breaker.metrics().consecutive_failures, 1);
    breaker.reset();
    assert_eq!(breaker.metrics().consecutive_failures, 0);
}
