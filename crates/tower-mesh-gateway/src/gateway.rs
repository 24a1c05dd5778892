use crate::auth::Authenticator;
use crate::config::{GatewayBuilder, GatewayConfig};
use crate::events::GatewayEvent;
use crate::request::{BackendCall, BackendRequest, BackendResponse, GatewayRequest, GatewayResponse};
use crate::table::RouteTable;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Service, ServiceExt};
use tower_mesh_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerLayer};
use tower_mesh_core::{BackendError, MeshError};
use tower_mesh_loadbalancer::LoadBalancer;
use tower_mesh_ratelimiter::ClientRateLimiter;
use tower_mesh_registry::ServiceRegistry;

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

pub(crate) struct GatewayInner {
    pub(crate) config: GatewayConfig,
    pub(crate) routes: RouteTable,
    pub(crate) registry: Arc<ServiceRegistry>,
    pub(crate) balancer: LoadBalancer,
    pub(crate) breakers: DashMap<String, CircuitBreaker>,
    pub(crate) breaker_template: CircuitBreakerLayer,
    pub(crate) limiter: ClientRateLimiter,
    pub(crate) authenticator: Arc<dyn Authenticator>,
}

impl GatewayInner {
    fn breaker_for(&self, instance: &str) -> CircuitBreaker {
        if let Some(breaker) = self.breakers.get(instance) {
            return breaker.clone();
        }
        self.breakers
            .entry(instance.to_string())
            .or_insert_with(|| self.breaker_template.new_breaker(instance))
            .clone()
    }
}

/// Routes requests to healthy service instances.
///
/// Each request runs through a fixed pipeline:
///
/// 1. match the route table (first match wins), else `404`
/// 2. apply the route's per-client rate limit, else `429`
/// 3. authenticate if the route requires it, else `401`
/// 4. discover healthy instances of the target service, else `503`
/// 5. select one with the route's strategy
/// 6. call it through that instance's circuit breaker, bounded by the route
///    timeout; breaker rejections and backend failures give `503`
///
/// The backend is any `tower::Service<BackendCall>`; the gateway owns no
/// transport. Cloning a gateway is cheap and clones share all state.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tower::service_fn;
/// use tower_mesh_core::BackendError;
/// use tower_mesh_gateway::{BackendCall, BackendResponse, Gateway, GatewayRequest, Route};
/// use tower_mesh_registry::{ServiceInstance, ServiceRegistry};
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = Arc::new(ServiceRegistry::default());
/// registry.register(ServiceInstance::new("users-1", "user-service", "10.0.0.5", 8080));
/// registry.heartbeat("users-1").unwrap();
///
/// let backend = service_fn(|call: BackendCall| async move {
///     Ok::<_, BackendError>(BackendResponse::ok(format!("user {}", call.request.path)))
/// });
///
/// let gateway = Gateway::builder(Arc::clone(&registry))
///     .route(Route::get("/api/users/:id", "user-service").rewrite("/users/:id"))
///     .build(backend);
///
/// let response = gateway.handle(http::Method::GET, "/api/users/42").await;
/// assert_eq!(response.status, http::StatusCode::OK);
/// assert_eq!(response.body_text(), "user /users/42");
/// assert_eq!(response.served_by.as_deref(), Some("users-1"));
/// # }
/// ```
pub struct Gateway<B> {
    inner: Arc<GatewayInner>,
    backend: B,
}

impl<B: Clone> Clone for Gateway<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            backend: self.backend.clone(),
        }
    }
}

impl Gateway<()> {
    /// Creates a builder reading instances from `registry`.
    pub fn builder(registry: Arc<ServiceRegistry>) -> GatewayBuilder {
        GatewayBuilder::new(registry)
    }
}

impl<B> Gateway<B> {
    pub(crate) fn from_parts(inner: Arc<GatewayInner>, backend: B) -> Self {
        Self { inner, backend }
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// The route table, in precedence order.
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// The registry the gateway discovers instances from.
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.inner.registry
    }

    /// The load balancer, including its connection tracker.
    pub fn load_balancer(&self) -> &LoadBalancer {
        &self.inner.balancer
    }

    /// The per-client rate limiter.
    pub fn rate_limiter(&self) -> &ClientRateLimiter {
        &self.inner.limiter
    }

    /// The breaker for `instance`, if a call has been routed to it.
    pub fn circuit_breaker(&self, instance: &str) -> Option<CircuitBreaker> {
        self.inner
            .breakers
            .get(instance)
            .map(|breaker| breaker.clone())
    }

    /// The breaker for `instance`, creating it if needed. Lets operators
    /// force a breaker open before any traffic reaches the instance.
    pub fn circuit_breaker_or_create(&self, instance: &str) -> CircuitBreaker {
        self.inner.breaker_for(instance)
    }

    /// Drops breakers and connection counters of instances no longer in the
    /// registry. Returns how many breakers were removed.
    pub fn prune_breakers(&self) -> usize {
        let registry = &self.inner.registry;
        let mut removed = Vec::new();
        self.inner.breakers.retain(|id, _| {
            let keep = registry.get(id).is_some();
            if !keep {
                removed.push(id.clone());
            }
            keep
        });
        for id in &removed {
            self.inner.balancer.connections().remove(id);
        }

        #[cfg(feature = "tracing")]
        if !removed.is_empty() {
            tracing::debug!(gateway = %self.inner.config.name, removed = removed.len(), "pruned breakers");
        }

        removed.len()
    }
}

impl<B> Gateway<B>
where
    B: Service<BackendCall, Response = BackendResponse, Error = BackendError> + Clone + Send,
    B::Future: Send,
{
    /// Runs `request` through the pipeline, returning the error that stopped
    /// it, if any.
    pub async fn dispatch(&self, request: GatewayRequest) -> Result<GatewayResponse, MeshError> {
        let start = Instant::now();
        let matched = self.inner.routes.find(&request.method, &request.path);
        let route_label = matched.as_ref().map(|m| m.route.label().to_string());

        let result = match matched {
            Some(matched) => self.proxy(request, matched.route, matched.params).await,
            None => Err(MeshError::RouteNotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            }),
        };

        self.record(route_label, &result, start);
        result
    }

    /// Like [`dispatch`](Self::dispatch), but renders errors as responses.
    pub async fn call_request(&self, request: GatewayRequest) -> GatewayResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(error) => GatewayResponse::from_error(&error),
        }
    }

    /// Shorthand for an anonymous, bodiless request to `uri`.
    pub async fn handle(&self, method: http::Method, uri: &str) -> GatewayResponse {
        self.call_request(GatewayRequest::new(method, uri)).await
    }

    async fn proxy(
        &self,
        request: GatewayRequest,
        route: &crate::Route,
        params: crate::PathParams,
    ) -> Result<GatewayResponse, MeshError> {
        let inner = &self.inner;

        if let Some(limit) = route.rate_limit_policy() {
            inner
                .limiter
                .check(route.label(), &request.client, limit)
                .map_err(|e| e.into_mesh_error(request.client.as_str()))?;
        }

        if route.auth_required() && !inner.authenticator.authenticate(&request) {
            return Err(MeshError::Unauthorized);
        }

        let instances = inner
            .registry
            .discover(route.service(), route.version_filter());
        let strategy = route
            .strategy_override()
            .unwrap_or(inner.config.default_strategy);
        let instance = inner
            .balancer
            .select(route.service(), &instances, strategy)
            .ok_or_else(|| MeshError::NoHealthyInstance {
                service: route.service().to_string(),
            })?
            .clone();
        let instance_id = instance.id().to_string();

        let breaker = inner.breaker_for(&instance_id);
        let timeout = route
            .timeout_override()
            .unwrap_or(inner.config.default_timeout);
        let call = BackendCall {
            instance,
            request: BackendRequest {
                path: route.backend_path(&request.path, &params),
                method: request.method,
                query: request.query,
                headers: request.headers,
                body: request.body,
                params,
            },
        };
        let backend = self.backend.clone();

        let _connection = inner.balancer.track(&instance_id);
        let result = breaker
            .execute(|| async move {
                tokio::time::timeout(timeout, backend.oneshot(call))
                    .await
                    .unwrap_or(Err(BackendError::Timeout { after: timeout }))
            })
            .await;

        match result {
            Ok(response) => Ok(GatewayResponse::from_backend(
                response,
                &instance_id,
                &inner.config.served_by_header,
            )),
            Err(CircuitBreakerError::OpenCircuit) => Err(MeshError::CircuitOpen {
                instance: instance_id,
            }),
            Err(CircuitBreakerError::Inner(source)) => Err(MeshError::Backend {
                instance: instance_id,
                source,
            }),
        }
    }

    fn record(
        &self,
        route: Option<String>,
        result: &Result<GatewayResponse, MeshError>,
        start: Instant,
    ) {
        let config = &self.inner.config;
        let duration = start.elapsed();
        let status = match result {
            Ok(response) => response.status,
            Err(error) => error.status_code(),
        };

        #[cfg(feature = "metrics")]
        {
            let label = route.clone().unwrap_or_else(|| "unmatched".to_string());
            counter!("gateway_requests_total", "route" => label.clone(), "status" => status.as_u16().to_string())
                .increment(1);
            histogram!("gateway_request_duration_seconds", "route" => label)
                .record(duration.as_secs_f64());
        }

        match result {
            Ok(response) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    gateway = %config.name,
                    route = route.as_deref().unwrap_or("unmatched"),
                    instance = response.served_by.as_deref().unwrap_or(""),
                    status = status.as_u16(),
                    duration_ms = duration.as_millis() as u64,
                    "request served"
                );

                config.event_listeners.emit_with(|| GatewayEvent::RequestServed {
                    gateway: config.name.clone(),
                    timestamp: Instant::now(),
                    route: route.unwrap_or_default(),
                    instance: response.served_by.clone().unwrap_or_default(),
                    status,
                    duration,
                });
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                if error.is_backend() {
                    tracing::warn!(
                        gateway = %config.name,
                        route = route.as_deref().unwrap_or("unmatched"),
                        status = status.as_u16(),
                        error = %error,
                        "backend call failed"
                    );
                } else {
                    tracing::debug!(
                        gateway = %config.name,
                        route = route.as_deref().unwrap_or("unmatched"),
                        status = status.as_u16(),
                        kind = error.kind(),
                        "request rejected"
                    );
                }

                config.event_listeners.emit_with(|| GatewayEvent::RequestFailed {
                    gateway: config.name.clone(),
                    timestamp: Instant::now(),
                    route,
                    status,
                    kind: error.kind(),
                    duration,
                });
            }
        }
    }
}

impl<B> Service<GatewayRequest> for Gateway<B>
where
    B: Service<BackendCall, Response = BackendResponse, Error = BackendError>
        + Clone
        + Send
        + Sync
        + 'static,
    B::Future: Send,
{
    type Response = GatewayResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<GatewayResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Backend readiness is awaited per call.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: GatewayRequest) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.call_request(request).await) })
    }
}

impl<B> std::fmt::Debug for Gateway<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.inner.config)
            .field("routes", &self.inner.routes.len())
            .field("breakers", &self.inner.breakers.len())
            .finish()
    }
}
