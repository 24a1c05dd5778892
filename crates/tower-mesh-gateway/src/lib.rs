//! API gateway for the mesh.
//!
//! A [`Gateway`] matches requests against an ordered route table, applies
//! per-route rate limits and authentication, discovers healthy instances in
//! a shared [`ServiceRegistry`](tower_mesh_registry::ServiceRegistry), picks
//! one with a [`LoadBalancer`](tower_mesh_loadbalancer::LoadBalancer), and
//! calls it through that instance's circuit breaker.
//!
//! The gateway is transport-neutral. Inbound, it is a
//! `tower::Service<GatewayRequest>` that never fails: every error becomes a
//! [`GatewayResponse`] with the matching status. Outbound, the proxied call is
//! any `tower::Service<BackendCall>` the host supplies.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::service_fn;
//! use tower_mesh_core::BackendError;
//! use tower_mesh_gateway::{BackendCall, BackendResponse, BearerTokenPresent, Gateway, Route};
//! use tower_mesh_ratelimiter::RateLimit;
//! use tower_mesh_registry::ServiceRegistry;
//!
//! let registry = Arc::new(ServiceRegistry::default());
//! let backend = service_fn(|_call: BackendCall| async move {
//!     Ok::<_, BackendError>(BackendResponse::ok("ok"))
//! });
//!
//! let gateway = Gateway::builder(registry)
//!     .name("edge")
//!     .route(
//!         Route::get("/api/users/:id", "user-service")
//!             .rewrite("/users/:id")
//!             .rate_limit(RateLimit::per_minute(600))
//!             .timeout(Duration::from_secs(2)),
//!     )
//!     .route(Route::post("/api/orders", "order-service").require_auth())
//!     .authenticator(BearerTokenPresent)
//!     .build(backend);
//! # let _ = gateway;
//! ```
//!
//! ## Features
//!
//! - `tracing`: log each dispatch outcome, here and in every component
//! - `metrics`: `gateway_requests_total{route, status}` and
//!   `gateway_request_duration_seconds{route}`, plus component metrics
//! - `serde`: derive `Serialize`/`Deserialize` for [`RouteSpec`]

mod auth;
mod config;
mod events;
mod gateway;
mod request;
mod route;
mod table;

pub use auth::{AllowAll, Authenticator, BearerTokenPresent};
pub use config::{GatewayBuilder, GatewayConfig};
pub use events::GatewayEvent;
pub use gateway::Gateway;
pub use request::{BackendCall, BackendRequest, BackendResponse, GatewayRequest, GatewayResponse};
pub use route::{PathParams, Route, RouteError, RoutePattern, RouteSpec};
pub use table::{RouteMatch, RouteTable};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        metrics::describe_counter!(
            "gateway_requests_total",
            "Total number of requests handled by the gateway by route and status"
        );
        metrics::describe_histogram!(
            "gateway_request_duration_seconds",
            "Time from request arrival to response, including rejections"
        );
    });
}
