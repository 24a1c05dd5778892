use crate::circuit::{Admission, Circuit, CircuitMetrics, CircuitState};
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerError;
#[cfg(feature = "metrics")]
use metrics::histogram;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A circuit breaker protecting one target.
///
/// Cloning is cheap and every clone shares the same state. State transitions
/// happen under a short synchronous lock that is never held across an
/// `.await`, so concurrent failures are never lost and the breaker keeps
/// working while a protected call hangs.
///
/// Event listeners run while that lock is held and must not call back into
/// the same breaker.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tower_mesh_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let breaker = CircuitBreaker::new(
///     CircuitBreakerConfig::builder()
///         .name("users-1")
///         .failure_threshold(2)
///         .recovery_timeout(Duration::from_secs(30))
///         .build_config(),
/// );
///
/// for _ in 0..2 {
///     let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
/// }
/// assert_eq!(breaker.state(), CircuitState::Open);
///
/// let result = breaker.execute(|| async { Ok::<_, &str>("never runs") }).await;
/// assert!(result.unwrap_err().is_circuit_open());
/// # }
/// ```
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    /// Creates a breaker in the closed state.
    pub fn new(config: impl Into<Arc<CircuitBreakerConfig>>) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new_with_atomic(Arc::clone(
                &state_atomic,
            )))),
            state_atomic,
            config: config.into(),
        }
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Breaker configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `operation` through the breaker.
    ///
    /// Returns [`CircuitBreakerError::OpenCircuit`] without calling
    /// `operation` when the circuit rejects the call. Otherwise the outcome
    /// is recorded and the operation's result returned, with its error
    /// wrapped in [`CircuitBreakerError::Inner`].
    ///
    /// Deadlines belong inside `operation` so that a timeout is recorded as
    /// a failure. If the returned future is dropped before completion the
    /// outcome is not recorded; a half-open trial abandoned this way frees
    /// its slot for the next caller.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire().ok_or(CircuitBreakerError::OpenCircuit)?;

        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        let result = operation().await;

        #[cfg(feature = "metrics")]
        histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => self.config.name.clone())
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(_) => permit.record_success(),
            Err(_) => permit.record_failure(),
        }
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Asks for permission to make one call.
    ///
    /// Returns `None` when the circuit rejects the call. The returned permit
    /// must be resolved with [`CallPermit::record_success`] or
    /// [`CallPermit::record_failure`]; dropping it records nothing.
    pub fn try_acquire(&self) -> Option<CallPermit> {
        match self.lock().try_acquire(&self.config) {
            Admission::Permitted { trial } => Some(CallPermit {
                breaker: self.clone(),
                trial,
                resolved: false,
            }),
            Admission::Rejected => None,
        }
    }

    /// Returns the current state without taking the lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a snapshot of the breaker's bookkeeping.
    pub fn metrics(&self) -> CircuitMetrics {
        self.lock().metrics()
    }

    /// Forces the circuit into the open state. The recovery timeout starts
    /// now.
    pub fn force_open(&self) {
        self.lock().force_open(&self.config);
    }

    /// Forces the circuit into the closed state.
    pub fn force_closed(&self) {
        self.lock().force_closed(&self.config);
    }

    /// Closes the circuit and clears failure bookkeeping.
    pub fn reset(&self) {
        self.lock().reset(&self.config);
    }

    /// Returns an HTTP status code based on circuit state.
    ///
    /// - Closed: 200 (OK)
    /// - HalfOpen: 200 (OK) - accepting a trial call
    /// - Open: 503 (Service Unavailable)
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// Returns "healthy" when closed, "degraded" when half-open and
    /// "unhealthy" when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to make one call through a [`CircuitBreaker`].
#[must_use = "a permit records nothing unless resolved"]
pub struct CallPermit {
    breaker: CircuitBreaker,
    trial: bool,
    resolved: bool,
}

impl CallPermit {
    /// Returns `true` if this is the half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Records that the call succeeded.
    pub fn record_success(mut self) {
        self.resolved = true;
        let breaker = &self.breaker;
        breaker.lock().record_success(&breaker.config, self.trial);
    }

    /// Records that the call failed.
    pub fn record_failure(mut self) {
        self.resolved = true;
        let breaker = &self.breaker;
        breaker.lock().record_failure(&breaker.config, self.trial);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.trial && !self.resolved {
            let breaker = &self.breaker;
            breaker.lock().release_trial(&breaker.config);
        }
    }
}

impl std::fmt::Debug for CallPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.config.name)
            .field("trial", &self.trial)
            .finish()
    }
}
