//! Service mesh control-plane core for Tower services.
//!
//! `tower-mesh` bundles the pieces a control plane needs to route traffic to
//! healthy service instances. Each component is available as an individual
//! crate and as a feature of this meta-crate.
//!
//! # Components
//!
//! - **Registry** (`registry` feature): instance registration, heartbeats,
//!   discovery of healthy instances and a periodic health-probe loop
//! - **Circuit Breaker** (`circuitbreaker` feature): per-target breakers that
//!   stop calling an instance after consecutive failures
//! - **Load Balancer** (`loadbalancer` feature): round-robin, random and
//!   least-connections selection
//! - **Rate Limiter** (`ratelimiter` feature): per-client fixed-window ceilings
//! - **Gateway** (`gateway` feature): the request pipeline that composes all of
//!   the above
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! tower-mesh = { version = "0.1", features = ["gateway", "tracing"] }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "gateway")]
//! # async fn example() {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::service_fn;
//! use tower_mesh::core::BackendError;
//! use tower_mesh::gateway::{BackendCall, BackendResponse, Gateway, Route};
//! use tower_mesh::registry::{RegistryConfig, ServiceInstance, ServiceRegistry};
//!
//! let registry = Arc::new(ServiceRegistry::new(
//!     RegistryConfig::builder()
//!         .health_check_interval(Duration::from_secs(5))
//!         .build(),
//! ));
//! registry.register(ServiceInstance::new("users-1", "user-service", "10.0.0.5", 8080));
//!
//! let backend = service_fn(|call: BackendCall| async move {
//!     // Hand the call to an HTTP client here.
//!     let _ = call.url();
//!     Ok::<_, BackendError>(BackendResponse::ok("..."))
//! });
//!
//! let gateway = Gateway::builder(Arc::clone(&registry))
//!     .route(Route::get("/api/users/:id", "user-service"))
//!     .build(backend);
//!
//! let response = gateway.handle(http::Method::GET, "/api/users/42").await;
//! println!("{} from {:?}", response.status, response.served_by);
//! # }
//! ```

pub mod observability;

// Re-export core (always available)
pub use tower_mesh_core as core;

// Re-export components based on features
#[cfg(feature = "circuitbreaker")]
pub use tower_mesh_circuitbreaker as circuitbreaker;

#[cfg(feature = "gateway")]
pub use tower_mesh_gateway as gateway;

#[cfg(feature = "loadbalancer")]
pub use tower_mesh_loadbalancer as loadbalancer;

#[cfg(feature = "ratelimiter")]
pub use tower_mesh_ratelimiter as ratelimiter;

#[cfg(feature = "registry")]
pub use tower_mesh_registry as registry;
