//! Consecutive-failure circuit breaker.
//!
//! One breaker guards one target. It moves through three states:
//!
//! - **Closed**: calls pass. Each failure increments a counter and any success
//!   resets it. Reaching `failure_threshold` opens the circuit.
//! - **Open**: calls are rejected without being attempted until
//!   `recovery_timeout` has elapsed since the circuit opened.
//! - **HalfOpen**: exactly one trial call is let through; every other call is
//!   rejected while it runs. Success closes the circuit, failure reopens it
//!   with a fresh timeout.
//!
//! The breaker works standalone through [`CircuitBreaker::execute`] or as Tower
//! middleware through [`CircuitBreakerLayer`].
//!
//! ## Basic Example
//!
//! ```rust
//! use std::time::Duration;
//! use tower_mesh_circuitbreaker::{CircuitBreakerLayer, CircuitState};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let template = CircuitBreakerLayer::builder()
//!     .failure_threshold(3)
//!     .recovery_timeout(Duration::from_secs(10))
//!     .on_state_transition(|from, to| println!("circuit {from} -> {to}"))
//!     .build();
//!
//! let breaker = template.new_breaker("users-1");
//! let body = breaker
//!     .execute(|| async { Ok::<_, std::io::Error>("hello") })
//!     .await
//!     .unwrap();
//! assert_eq!(body, "hello");
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```
//!
//! ## Features
//!
//! - `tracing`: log transitions at `info` and permits/rejections at `trace`
//! - `metrics`: `circuitbreaker_calls_total`, `circuitbreaker_transitions_total`,
//!   `circuitbreaker_state` and `circuitbreaker_call_duration_seconds`
//! - `serde`: derive `Serialize`/`Deserialize` for [`CircuitState`]

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge, describe_histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

pub use breaker::{CallPermit, CircuitBreaker};
pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod breaker;
mod circuit;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker by outcome (success, failure, rejected)"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (1 for the active state label)"
        );
        describe_histogram!(
            "circuitbreaker_call_duration_seconds",
            "Duration of calls through the circuit breaker"
        );
    });
}
