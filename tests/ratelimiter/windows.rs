use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_mesh_core::MeshEvent;
use tower_mesh_ratelimiter::{ClientRateLimiter, RateLimit, RateLimiterConfig, RateLimiterError};

const ROUTE: &str = "GET /api/users/:id";

#[test]
fn third_request_in_window_is_rejected() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::per_minute(2);

    assert_eq!(limiter.check(ROUTE, "10.0.0.1", &limit), Ok(1));
    assert_eq!(limiter.check(ROUTE, "10.0.0.1", &limit), Ok(0));

    let err = limiter.check(ROUTE, "10.0.0.1", &limit).unwrap_err();
    assert!(err.retry_after() > Duration::ZERO);
    assert!(err.retry_after() <= Duration::from_secs(60));
}

#[test]
fn rejected_requests_do_not_extend_the_window() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::per_minute(1);

    limiter.check(ROUTE, "c", &limit).unwrap();
    let first = limiter.check(ROUTE, "c", &limit).unwrap_err().retry_after();
    std::thread::sleep(Duration::from_millis(20));
    let second = limiter.check(ROUTE, "c", &limit).unwrap_err().retry_after();

    assert!(second < first);
}

#[test]
fn clients_have_independent_windows() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::per_minute(1);

    assert!(limiter.check(ROUTE, "alice", &limit).is_ok());
    assert!(limiter.check(ROUTE, "alice", &limit).is_err());
    assert!(limiter.check(ROUTE, "bob", &limit).is_ok());
}

#[test]
fn routes_have_independent_budgets() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::per_minute(1);

    assert!(limiter.check("GET /a", "alice", &limit).is_ok());
    assert!(limiter.check("GET /b", "alice", &limit).is_ok());
    assert!(limiter.check("GET /a", "alice", &limit).is_err());
}

#[tokio::test]
async fn window_resets_after_its_length() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::new(2, Duration::from_millis(50));

    limiter.check(ROUTE, "c", &limit).unwrap();
    limiter.check(ROUTE, "c", &limit).unwrap();
    assert!(limiter.check(ROUTE, "c", &limit).is_err());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(limiter.check(ROUTE, "c", &limit), Ok(1));
}

#[test]
fn rejection_converts_to_too_many_requests() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::per_second(0);

    let err = limiter.check(ROUTE, "10.0.0.7", &limit).unwrap_err();
    assert!(matches!(err, RateLimiterError::RateLimitExceeded { .. }));

    let mesh = err.into_mesh_error("10.0.0.7");
    assert_eq!(mesh.status_code().as_u16(), 429);
    assert!(mesh.is_rate_limited());
}

#[test]
fn events_report_scope_and_client() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let limiter = RateLimiterConfig::builder()
        .name("edge")
        .on_event(move |event| {
            s.lock()
                .unwrap()
                .push((event.event_type(), event.source().to_string()));
        })
        .build();
    let limit = RateLimit::per_minute(1);

    let _ = limiter.check(ROUTE, "c", &limit);
    let _ = limiter.check(ROUTE, "c", &limit);

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("permit_acquired", "edge".to_string()),
            ("permit_rejected", "edge".to_string()),
        ]
    );
}

#[test]
fn acquired_callback_reports_remaining() {
    let remaining = Arc::new(Mutex::new(Vec::new()));
    let r = Arc::clone(&remaining);
    let limiter = RateLimiterConfig::builder()
        .on_permit_acquired(move |client, left| {
            assert_eq!(client, "c");
            r.lock().unwrap().push(left);
        })
        .build();
    let limit = RateLimit::per_minute(3);

    for _ in 0..3 {
        limiter.check(ROUTE, "c", &limit).unwrap();
    }
    assert_eq!(*remaining.lock().unwrap(), vec![2, 1, 0]);
}

#[test]
fn reset_forgets_a_client() {
    let limiter = ClientRateLimiter::default();
    let limit = RateLimit::per_minute(1);

    limiter.check(ROUTE, "c", &limit).unwrap();
    assert!(limiter.check(ROUTE, "c", &limit).is_err());
    limiter.reset(ROUTE, "c");
    assert!(limiter.check(ROUTE, "c", &limit).is_ok());
}

#[tokio::test]
async fn expired_windows_are_evicted() {
    let limiter = ClientRateLimiter::default();
    let short = RateLimit::new(5, Duration::from_millis(10));

    for client in ["a", "b", "c"] {
        limiter.check(ROUTE, client, &short).unwrap();
    }
    assert_eq!(limiter.tracked_clients(), 3);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(limiter.evict_expired(), 3);
    assert_eq!(limiter.tracked_clients(), 0);
}
