use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreakerLayer, CircuitState};
use std::time::Duration;
use tower_mesh_core::EventListeners;

/// Configuration for a circuit breaker.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Breaker name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consecutive failures that open the circuit.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time the circuit stays open before a trial call is allowed.
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            event_listeners: EventListeners::new(),
        }
    }
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("recovery_timeout", &self.recovery_timeout)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        crate::describe_metrics();
        Self {
            config: CircuitBreakerConfig::default(),
        }
    }

    /// Sets the number of consecutive failures that open the circuit.
    ///
    /// Any success while closed resets the count.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the circuit stays open before one trial call is let
    /// through.
    ///
    /// Default: 30 seconds
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    /// Gives this circuit breaker a name for observability.
    ///
    /// Breakers minted with [`CircuitBreakerLayer::new_breaker`] use their
    /// own name instead.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Registers a callback when a state transition occurs.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            });
        self
    }

    /// Registers a callback when a call is permitted.
    ///
    /// The callback receives the state at the time of the permit.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            });
        self
    }

    /// Registers a callback when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected { .. } = event {
                    f();
                }
            });
        self
    }

    /// Registers a callback when a success is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            });
        self
    }

    /// Registers a callback when a failure is recorded.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            });
        self
    }

    /// Registers a callback for every breaker event. The breaker's name is
    /// available through the event's `source()`.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.config.event_listeners.add_fn(f);
        self
    }

    /// Returns the configuration without wrapping it in a layer.
    pub fn build_config(self) -> CircuitBreakerConfig {
        self.config
    }

    /// Builds the circuit breaker layer.
    pub fn build(self) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(self.config)
    }
}
