use crate::events::RateLimiterEvent;
use crate::ClientRateLimiter;
use std::time::Duration;
use tower_mesh_core::EventListeners;

/// Configuration for a [`ClientRateLimiter`].
#[derive(Clone)]
pub struct RateLimiterConfig {
    pub(crate) name: String,
    pub(crate) max_tracked_clients: usize,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiterConfig {
    /// Creates a new builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Limiter name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tracked-counter count above which expired windows are evicted.
    pub fn max_tracked_clients(&self) -> usize {
        self.max_tracked_clients
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_tracked_clients: 10_000,
            event_listeners: EventListeners::new(),
        }
    }
}

impl std::fmt::Debug for RateLimiterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterConfig")
            .field("name", &self.name)
            .field("max_tracked_clients", &self.max_tracked_clients)
            .finish()
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    config: RateLimiterConfig,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: RateLimiterConfig::default(),
        }
    }

    /// Gives this rate limiter a name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets how many counters may be tracked before expired windows are
    /// swept. Live windows are never evicted.
    ///
    /// Default: 10,000
    pub fn max_tracked_clients(mut self, max: usize) -> Self {
        self.config.max_tracked_clients = max;
        self
    }

    /// Registers a callback when a request is allowed.
    ///
    /// The callback receives: (client, remaining)
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u32) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &RateLimiterEvent| {
                if let RateLimiterEvent::PermitAcquired {
                    client, remaining, ..
                } = event
                {
                    f(client, *remaining);
                }
            });
        self
    }

    /// Registers a callback when a request is rejected.
    ///
    /// The callback receives: (client, retry_after)
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &RateLimiterEvent| {
                if let RateLimiterEvent::PermitRejected {
                    client,
                    retry_after,
                    ..
                } = event
                {
                    f(client, *retry_after);
                }
            });
        self
    }

    /// Registers a callback for every limiter event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimiterEvent) + Send + Sync + 'static,
    {
        self.config.event_listeners.add_fn(f);
        self
    }

    /// Returns the configuration.
    pub fn build_config(self) -> RateLimiterConfig {
        self.config
    }

    /// Builds the rate limiter.
    pub fn build(self) -> ClientRateLimiter {
        ClientRateLimiter::new(self.config)
    }
}
