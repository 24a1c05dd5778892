use thiserror::Error;

/// Errors returned by a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit is open; call not permitted")]
    OpenCircuit,

    /// The operation ran and failed. The failure has been recorded.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit)
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit => None,
        }
    }

    /// Maps the inner error.
    pub fn map_inner<F, E2>(self, f: F) -> CircuitBreakerError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            CircuitBreakerError::OpenCircuit => CircuitBreakerError::OpenCircuit,
            CircuitBreakerError::Inner(e) => CircuitBreakerError::Inner(f(e)),
        }
    }
}

impl<E> From<E> for CircuitBreakerError<E> {
    fn from(err: E) -> Self {
        CircuitBreakerError::Inner(err)
    }
}
