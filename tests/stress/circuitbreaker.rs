//! Circuit breaker stress tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tower_mesh_circuitbreaker::{CircuitBreakerLayer, CircuitState};

use super::InFlight;

/// Test: 1 million calls through a closed breaker
#[tokio::test]
#[ignore]
async fn stress_one_million_calls() {
    let breaker = CircuitBreakerLayer::builder().build().breaker();
    let call_count = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    for _ in 0..1_000_000 {
        let counter = Arc::clone(&call_count);
        let _ = breaker
            .execute(|| async move {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok::<_, ()>(())
            })
            .await;
    }
    let elapsed = start.elapsed();

    println!("1M calls completed in {:?}", elapsed);
    println!(
        "Throughput: {:.0} calls/sec",
        1_000_000.0 / elapsed.as_secs_f64()
    );
    assert_eq!(call_count.load(Ordering::Relaxed), 1_000_000);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// Test: many tasks racing for the half-open trial, never more than one runs
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_single_trial_under_contention() {
    let breaker = CircuitBreakerLayer::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_millis(2))
        .build()
        .breaker();
    let tracker = InFlight::new();

    for round in 0..200 {
        let _ = breaker.execute(|| async { Err::<(), _>("trip") }).await;
        assert_eq!(breaker.state(), CircuitState::Open, "round {round}");
        sleep(Duration::from_millis(3)).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let breaker = breaker.clone();
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                breaker
                    .execute(|| async {
                        let _trial = tracker.enter();
                        sleep(Duration::from_millis(1)).await;
                        Err::<(), _>("still down")
                    })
                    .await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }
    }

    println!("Peak concurrent trials: {}", tracker.peak());
    assert_eq!(tracker.peak(), 1);
}

/// Test: rapid open/close cycling stays consistent
#[tokio::test]
#[ignore]
async fn stress_rapid_state_transitions() {
    let transitions = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&transitions);
    let breaker = CircuitBreakerLayer::builder()
        .failure_threshold(3)
        .recovery_timeout(Duration::from_millis(1))
        .on_state_transition(move |_, _| {
            t.fetch_add(1, Ordering::Relaxed);
        })
        .build()
        .breaker();

    for i in 0..10_000 {
        let ok = i % 20 >= 10;
        let _ = breaker
            .execute(|| async move { if ok { Ok(()) } else { Err(()) } })
            .await;
        if i % 20 == 9 {
            sleep(Duration::from_millis(2)).await;
        }
    }

    let m = breaker.metrics();
    println!("Transitions: {}", transitions.load(Ordering::Relaxed));
    println!("Metrics: {:?}", m);
    assert!(transitions.load(Ordering::Relaxed) > 0);
    assert_eq!(m.total_successes + m.total_failures + m.total_rejections, 10_000);
}
