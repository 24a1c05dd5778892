//! Configuration for the service registry.

use crate::events::RegistryEvent;
use crate::HealthStatus;
use std::time::Duration;
use tower_mesh_core::EventListeners;

/// Configuration for a [`ServiceRegistry`](crate::ServiceRegistry).
#[derive(Clone)]
pub struct RegistryConfig {
    pub(crate) name: String,
    pub(crate) health_check_interval: Duration,
    pub(crate) initial_delay: Duration,
    pub(crate) probe_timeout: Duration,
    pub(crate) failure_threshold: u32,
    pub(crate) success_threshold: u32,
    pub(crate) heartbeat_ttl: Option<Duration>,
    pub(crate) event_listeners: EventListeners<RegistryEvent>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfigBuilder::default().build()
    }
}

impl RegistryConfig {
    /// Creates a new builder.
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::default()
    }

    /// Registry name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interval between health loop ticks.
    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }

    /// Delay before the first tick.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Deadline for a single probe.
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Consecutive failed probes before an instance turns unhealthy.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Consecutive successful probes before an instance turns healthy.
    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// Maximum heartbeat age for discovery, if expiry is enabled.
    pub fn heartbeat_ttl(&self) -> Option<Duration> {
        self.heartbeat_ttl
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("name", &self.name)
            .field("health_check_interval", &self.health_check_interval)
            .field("initial_delay", &self.initial_delay)
            .field("probe_timeout", &self.probe_timeout)
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("heartbeat_ttl", &self.heartbeat_ttl)
            .finish()
    }
}

/// Builder for [`RegistryConfig`].
pub struct RegistryConfigBuilder {
    name: String,
    health_check_interval: Duration,
    initial_delay: Duration,
    probe_timeout: Duration,
    failure_threshold: u32,
    success_threshold: u32,
    heartbeat_ttl: Option<Option<Duration>>,
    event_listeners: EventListeners<RegistryEvent>,
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            health_check_interval: Duration::from_secs(10),
            initial_delay: Duration::ZERO,
            probe_timeout: Duration::from_secs(5),
            failure_threshold: 1,
            success_threshold: 1,
            heartbeat_ttl: None,
            event_listeners: EventListeners::new(),
        }
    }
}

impl RegistryConfigBuilder {
    /// Sets the registry name.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the interval between health loop ticks.
    ///
    /// Default: 10 seconds
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Sets the delay before the first tick.
    ///
    /// Default: none
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the deadline for a single probe. A probe that exceeds it counts
    /// as failed.
    ///
    /// Default: 5 seconds
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets how many consecutive failed probes turn an instance unhealthy.
    ///
    /// Default: 1
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how many consecutive successful probes turn an instance healthy.
    ///
    /// Default: 1
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Sets the maximum heartbeat age. Instances whose last heartbeat (or
    /// successful probe) is older are left out of discovery and marked
    /// unhealthy by the next health loop tick.
    ///
    /// Default: twice the health check interval
    pub fn heartbeat_ttl(mut self, ttl: Duration) -> Self {
        self.heartbeat_ttl = Some(Some(ttl));
        self
    }

    /// Disables heartbeat expiry; only probes and heartbeats decide health.
    pub fn disable_heartbeat_expiry(mut self) -> Self {
        self.heartbeat_ttl = Some(None);
        self
    }

    /// Registers a callback for health transitions.
    ///
    /// The callback receives: (instance_id, old_status, new_status)
    pub fn on_health_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, HealthStatus, HealthStatus) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RegistryEvent| {
            if let RegistryEvent::HealthChanged {
                instance_id,
                from,
                to,
                ..
            } = event
            {
                f(instance_id, *from, *to);
            }
        });
        self
    }

    /// Registers a callback for new or replaced registrations.
    ///
    /// The callback receives: (instance_id, service)
    pub fn on_registered<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RegistryEvent| {
            if let RegistryEvent::InstanceRegistered {
                instance_id,
                service,
                ..
            } = event
            {
                f(instance_id, service);
            }
        });
        self
    }

    /// Registers a callback for removed registrations.
    ///
    /// The callback receives: (instance_id, service)
    pub fn on_unregistered<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RegistryEvent| {
            if let RegistryEvent::InstanceUnregistered {
                instance_id,
                service,
                ..
            } = event
            {
                f(instance_id, service);
            }
        });
        self
    }

    /// Registers a callback for every registry event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RegistryConfig {
        let heartbeat_ttl = self
            .heartbeat_ttl
            .unwrap_or(Some(self.health_check_interval * 2));

        RegistryConfig {
            name: self.name,
            health_check_interval: self.health_check_interval,
            initial_delay: self.initial_delay,
            probe_timeout: self.probe_timeout,
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            heartbeat_ttl,
            event_listeners: self.event_listeners,
        }
    }
}
