use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::error::CircuitBreakerError;
use crate::CircuitBreaker;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower layer that applies circuit breaker behavior to an inner service.
///
/// Besides wrapping services, the layer serves as a template for minting
/// standalone breakers that share its settings and listeners, one per target:
///
/// ```rust
/// use std::time::Duration;
/// use tower_mesh_circuitbreaker::CircuitBreakerLayer;
///
/// let template = CircuitBreakerLayer::builder()
///     .failure_threshold(5)
///     .recovery_timeout(Duration::from_secs(10))
///     .build();
///
/// let a = template.new_breaker("users-1");
/// let b = template.new_breaker("users-2");
/// a.force_open();
/// assert!(a.is_open());
/// assert!(!b.is_open());
/// ```
///
/// Used as middleware:
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use tower_mesh_circuitbreaker::CircuitBreakerLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::builder().failure_threshold(3).build())
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreakerLayer {
    pub(crate) fn new(config: impl Into<Arc<CircuitBreakerConfig>>) -> Self {
        Self {
            config: config.into(),
        }
    }

    /// Creates a new builder for configuring a circuit breaker layer.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Returns the shared configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Creates an independent breaker named after the layer.
    pub fn breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(Arc::clone(&self.config))
    }

    /// Creates an independent breaker with this layer's settings and
    /// listeners under a different name.
    pub fn new_breaker(&self, name: impl Into<String>) -> CircuitBreaker {
        CircuitBreaker::new(self.config.renamed(name))
    }

    /// Wraps the given service with a fresh breaker.
    pub fn layer_fn<S>(&self, service: S) -> CircuitBreakerService<S> {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker(),
        }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, service: S) -> Self::Service {
        self.layer_fn(service)
    }
}

/// A Tower service guarded by a [`CircuitBreaker`].
///
/// Every inner error counts as a failure.
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    /// Wraps `inner` with an existing breaker.
    pub fn new(inner: S, breaker: CircuitBreaker) -> Self {
        Self { inner, breaker }
    }

    /// Returns the breaker guarding this service.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let Some(permit) = self.breaker.try_acquire() else {
            return Box::pin(async { Err(CircuitBreakerError::OpenCircuit) });
        };

        // Take the service that was driven to readiness and leave a clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).await;
            match &result {
                Ok(_) => permit.record_success(),
                Err(_) => permit.record_failure(),
            }
            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
