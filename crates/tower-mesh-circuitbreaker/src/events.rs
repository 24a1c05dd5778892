use crate::CircuitState;
use std::time::Instant;
use tower_mesh_core::MeshEvent;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the circuit breaker.
    CallPermitted {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected without being attempted.
    CallRejected { breaker: String, timestamp: Instant },
    /// The circuit breaker transitioned between states.
    StateTransition {
        breaker: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed call was recorded.
    FailureRecorded {
        breaker: String,
        timestamp: Instant,
        state: CircuitState,
        consecutive_failures: u32,
    },
}

impl MeshEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { breaker, .. }
            | CircuitBreakerEvent::CallRejected { breaker, .. }
            | CircuitBreakerEvent::StateTransition { breaker, .. }
            | CircuitBreakerEvent::SuccessRecorded { breaker, .. }
            | CircuitBreakerEvent::FailureRecorded { breaker, .. } => breaker,
        }
    }
}
