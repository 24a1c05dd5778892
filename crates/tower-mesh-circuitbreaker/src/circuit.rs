use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed = 0,
    /// Calls are rejected until the recovery timeout elapses.
    Open = 1,
    /// One trial call decides whether the circuit closes or reopens.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of circuit breaker state for observability.
///
/// All fields come from a single lock acquisition, so they are consistent
/// with each other.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitMetrics {
    /// Current state of the circuit breaker.
    pub state: CircuitState,
    /// Failures since the last success or state change.
    pub consecutive_failures: u32,
    /// When the most recent failure was recorded.
    pub last_failure_at: Option<Instant>,
    /// When an open circuit will allow its trial call.
    pub next_attempt_at: Option<Instant>,
    /// Whether the half-open trial call is currently running.
    pub trial_in_flight: bool,
    /// Successful calls recorded over the breaker's lifetime.
    pub total_successes: u64,
    /// Failed calls recorded over the breaker's lifetime.
    pub total_failures: u64,
    /// Calls rejected over the breaker's lifetime.
    pub total_rejections: u64,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

/// Outcome of asking the circuit for permission to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Permitted { trial: bool },
    Rejected,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    next_attempt_at: Option<Instant>,
    trial_in_flight: bool,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl Circuit {
    pub(crate) fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            consecutive_failures: 0,
            last_failure_at: None,
            next_attempt_at: None,
            trial_in_flight: false,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::new_with_atomic(Arc::new(AtomicU8::new(CircuitState::Closed as u8)))
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            last_failure_at: self.last_failure_at,
            next_attempt_at: self.next_attempt_at,
            trial_in_flight: self.trial_in_flight,
            total_successes: self.total_successes,
            total_failures: self.total_failures,
            total_rejections: self.total_rejections,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Admission {
        let admission = match self.state {
            CircuitState::Closed => Admission::Permitted { trial: false },
            CircuitState::Open => {
                let due = self
                    .next_attempt_at
                    .map_or(true, |at| Instant::now() >= at);
                if due {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.trial_in_flight = true;
                    Admission::Permitted { trial: true }
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    Admission::Rejected
                } else {
                    self.trial_in_flight = true;
                    Admission::Permitted { trial: true }
                }
            }
        };

        match admission {
            Admission::Permitted { .. } => {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %config.name, state = %self.state, "call permitted");

                config
                    .event_listeners
                    .emit_with(|| CircuitBreakerEvent::CallPermitted {
                        breaker: config.name.clone(),
                        timestamp: Instant::now(),
                        state: self.state,
                    });
            }
            Admission::Rejected => {
                self.total_rejections += 1;

                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %config.name, state = %self.state, "call rejected");

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);

                config
                    .event_listeners
                    .emit_with(|| CircuitBreakerEvent::CallRejected {
                        breaker: config.name.clone(),
                        timestamp: Instant::now(),
                    });
            }
        }

        admission
    }

    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig, trial: bool) {
        self.total_successes += 1;

        config
            .event_listeners
            .emit_with(|| CircuitBreakerEvent::SuccessRecorded {
                breaker: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

        match self.state {
            CircuitState::Closed => self.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.transition_to(CircuitState::Closed, config);
            }
            // Late results from calls admitted before the last transition
            // do not move the state machine.
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig, trial: bool) {
        let now = Instant::now();
        self.total_failures += 1;
        self.last_failure_at = Some(now);
        if self.state == CircuitState::Closed {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }

        config
            .event_listeners
            .emit_with(|| CircuitBreakerEvent::FailureRecorded {
                breaker: config.name.clone(),
                timestamp: now,
                state: self.state,
                consecutive_failures: self.consecutive_failures,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

        match self.state {
            CircuitState::Closed if self.consecutive_failures >= config.failure_threshold => {
                self.transition_to(CircuitState::Open, config);
            }
            CircuitState::HalfOpen if trial => {
                self.trial_in_flight = false;
                self.transition_to(CircuitState::Open, config);
            }
            _ => {}
        }
    }

    /// Frees the half-open trial slot of a call that never reported back.
    pub(crate) fn release_trial(&mut self, config: &CircuitBreakerConfig) {
        if self.state == CircuitState::HalfOpen && self.trial_in_flight {
            self.trial_in_flight = false;

            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %config.name, "half-open trial abandoned; slot released");
            #[cfg(not(feature = "tracing"))]
            let _ = config;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
        self.consecutive_failures = 0;
        self.last_failure_at = None;
        self.trial_in_flight = false;
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;
        let now = Instant::now();

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = now;
        match state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.next_attempt_at = None;
                self.trial_in_flight = false;
            }
            CircuitState::Open => {
                self.next_attempt_at = Some(now + config.recovery_timeout);
                self.trial_in_flight = false;
            }
            CircuitState::HalfOpen => {
                self.next_attempt_at = None;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = %from_state,
            to = %state,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone(), "state" => from_state.as_str())
                .set(0.0);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone(), "state" => state.as_str())
                .set(1.0);
        }

        config
            .event_listeners
            .emit_with(|| CircuitBreakerEvent::StateTransition {
                breaker: config.name.clone(),
                timestamp: now,
                from_state,
                to_state: state,
            });
    }
}
