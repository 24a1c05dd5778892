use crate::auth::{AllowAll, Authenticator};
use crate::events::GatewayEvent;
use crate::gateway::{Gateway, GatewayInner};
use crate::route::Route;
use crate::table::RouteTable;
use dashmap::DashMap;
use http::header::HeaderName;
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tower_mesh_circuitbreaker::CircuitBreakerLayer;
use tower_mesh_core::EventListeners;
use tower_mesh_loadbalancer::{LoadBalanceStrategy, LoadBalancer};
use tower_mesh_ratelimiter::{ClientRateLimiter, RateLimiterConfig};
use tower_mesh_registry::ServiceRegistry;

/// Gateway-wide settings. Routes may override the timeout and strategy.
#[derive(Clone)]
pub struct GatewayConfig {
    pub(crate) name: String,
    pub(crate) default_timeout: Duration,
    pub(crate) default_strategy: LoadBalanceStrategy,
    pub(crate) served_by_header: HeaderName,
    pub(crate) event_listeners: EventListeners<GatewayEvent>,
}

impl GatewayConfig {
    /// Gateway name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timeout for routes that do not set one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Strategy for routes that do not set one.
    pub fn default_strategy(&self) -> LoadBalanceStrategy {
        self.default_strategy
    }

    /// Header carrying the serving instance id.
    pub fn served_by_header(&self) -> &HeaderName {
        &self.served_by_header
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            default_timeout: Duration::from_secs(30),
            default_strategy: LoadBalanceStrategy::RoundRobin,
            served_by_header: HeaderName::from_static("x-served-by"),
            event_listeners: EventListeners::new(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("name", &self.name)
            .field("default_timeout", &self.default_timeout)
            .field("default_strategy", &self.default_strategy)
            .field("served_by_header", &self.served_by_header)
            .finish()
    }
}

/// Builder for [`Gateway`].
///
/// The registry is shared with whoever registers instances and runs health
/// checks; the gateway only reads from it.
pub struct GatewayBuilder {
    registry: Arc<ServiceRegistry>,
    config: GatewayConfig,
    routes: RouteTable,
    authenticator: Arc<dyn Authenticator>,
    circuit_breaker: Option<CircuitBreakerLayer>,
    rate_limiter: RateLimiterConfig,
    balancer: Option<LoadBalancer>,
}

impl GatewayBuilder {
    /// Creates a builder reading instances from `registry`.
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            config: GatewayConfig::default(),
            routes: RouteTable::new(),
            authenticator: Arc::new(AllowAll),
            circuit_breaker: None,
            rate_limiter: RateLimiterConfig::default(),
            balancer: None,
        }
    }

    /// Gives this gateway a name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Adds a route. Routes are matched in the order they are added.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds several routes, in order.
    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Sets the authenticator consulted for auth-required routes.
    ///
    /// Default: [`AllowAll`]
    pub fn authenticator<A: Authenticator>(mut self, authenticator: A) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Sets the template for per-instance breakers. Each instance gets its own
    /// breaker, named after the instance id, with these settings and
    /// listeners.
    ///
    /// Default: failure threshold 5, recovery timeout 30s
    pub fn circuit_breaker(mut self, template: CircuitBreakerLayer) -> Self {
        self.circuit_breaker = Some(template);
        self
    }

    /// Configures the per-client rate limiter shared by all routes.
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiter = config;
        self
    }

    /// Uses an existing load balancer, for example one whose connection
    /// tracker is shared with another component.
    pub fn load_balancer(mut self, balancer: LoadBalancer) -> Self {
        self.balancer = Some(balancer);
        self
    }

    /// Sets the timeout for routes that do not set one.
    ///
    /// Default: 30 seconds
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Sets the strategy for routes that do not set one.
    ///
    /// Default: round-robin
    pub fn default_strategy(mut self, strategy: LoadBalanceStrategy) -> Self {
        self.config.default_strategy = strategy;
        self
    }

    /// Sets the header that names the serving instance on proxied responses.
    ///
    /// Default: `x-served-by`
    pub fn served_by_header(mut self, header: HeaderName) -> Self {
        self.config.served_by_header = header;
        self
    }

    /// Registers a callback when a backend answers a request.
    ///
    /// The callback receives: (instance id, status)
    pub fn on_request_served<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, StatusCode) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &GatewayEvent| {
                if let GatewayEvent::RequestServed {
                    instance, status, ..
                } = event
                {
                    f(instance, *status);
                }
            });
        self
    }

    /// Registers a callback when the gateway answers with an error.
    ///
    /// The callback receives: (error kind, status)
    pub fn on_request_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&'static str, StatusCode) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add_fn(move |event: &GatewayEvent| {
                if let GatewayEvent::RequestFailed { kind, status, .. } = event {
                    f(kind, *status);
                }
            });
        self
    }

    /// Registers a callback for every gateway event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.config.event_listeners.add_fn(f);
        self
    }

    /// Builds the gateway around `backend`, the service that performs the
    /// proxied calls.
    pub fn build<B>(self, backend: B) -> Gateway<B> {
        crate::describe_metrics();

        let inner = GatewayInner {
            config: self.config,
            routes: self.routes,
            registry: self.registry,
            balancer: self.balancer.unwrap_or_else(LoadBalancer::new),
            breakers: DashMap::new(),
            breaker_template: self
                .circuit_breaker
                .unwrap_or_else(|| CircuitBreakerLayer::builder().build()),
            limiter: ClientRateLimiter::new(self.rate_limiter),
            authenticator: self.authenticator,
        };
        Gateway::from_parts(Arc::new(inner), backend)
    }
}
