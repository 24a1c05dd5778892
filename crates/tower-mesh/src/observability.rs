//! Observability guide for tower-mesh.
//!
//! Every component supports optional `tracing` and `metrics` features. Enable
//! them on this crate to forward them to every enabled component.

/// Metrics documentation
pub mod metrics {
    //! # Metrics Guide
    //!
    //! ## Enabling Metrics
    //!
    //! ```toml
    //! [dependencies]
    //! tower-mesh = { version = "0.1", features = ["gateway", "metrics"] }
    //! metrics = "0.24"
    //! metrics-exporter-prometheus = "0.16"
    //! ```
    //!
    //! Install a recorder before building components. Descriptions are
    //! registered once per process when the first component is built.
    //!
    //! ## Instance Naming
    //!
    //! The gateway names each per-instance breaker after the instance id, so
    //! breaker metrics are labeled per instance without extra configuration:
    //!
    //! ```text
    //! circuitbreaker_state{circuitbreaker="users-1",state="Open"} 1
    //! circuitbreaker_calls_total{circuitbreaker="users-2",outcome="success"} 412
    //! ```
    //!
    //! ## Available Metrics by Component
    //!
    //! ### Registry
    //!
    //! - `registry_instances{service}` - Registered instances gauge
    //! - `registry_probes_total{outcome}` - Probe results (healthy/unhealthy/unknown/timeout)
    //!
    //! ### Circuit Breaker
    //!
    //! - `circuitbreaker_calls_total{circuitbreaker, outcome}` - Calls (success/failure/rejected)
    //! - `circuitbreaker_transitions_total{circuitbreaker, from, to}` - State transitions
    //! - `circuitbreaker_state{circuitbreaker, state}` - Current state gauge
    //! - `circuitbreaker_call_duration_seconds{circuitbreaker}` - Call duration histogram
    //!
    //! ### Load Balancer
    //!
    //! - `loadbalancer_selections_total{strategy}` - Selections per strategy
    //!
    //! ### Rate Limiter
    //!
    //! - `ratelimiter_calls_total{ratelimiter, result}` - Checks (permitted/rejected)
    //!
    //! ### Gateway
    //!
    //! - `gateway_requests_total{route, status}` - Requests by route and status;
    //!   requests that match no route use `route="unmatched"`
    //! - `gateway_request_duration_seconds{route}` - End-to-end latency histogram
    //!
    //! ## Example Prometheus Queries
    //!
    //! ```promql
    //! # Share of gateway responses that are 503
    //! sum(rate(gateway_requests_total{status="503"}[5m]))
    //!   /
    //! sum(rate(gateway_requests_total[5m]))
    //!
    //! # Instances with an open breaker
    //! circuitbreaker_state{state="Open"} == 1
    //!
    //! # P99 latency per route
    //! histogram_quantile(0.99,
    //!   sum by (route, le) (rate(gateway_request_duration_seconds_bucket[5m]))
    //! )
    //! ```
}

/// Tracing documentation
pub mod tracing {
    //! # Tracing Guide
    //!
    //! With the `tracing` feature, components log with structured fields
    //! (`breaker`, `registry`, `instance`, `service`, `route`).
    //!
    //! | Level | Events |
    //! |-------|--------|
    //! | `info` | breaker state transitions, instance recovered |
    //! | `warn` | instance became unhealthy, backend call failed |
    //! | `debug` | register/unregister, probe timeouts, expected gateway rejections (404, 429, 401, 503) |
    //! | `trace` | breaker permits and rejections, load balancer selections, rate limiter permits |
    //!
    //! ```rust,ignore
    //! tracing_subscriber::fmt()
    //!     .with_env_filter("tower_mesh_gateway=debug,tower_mesh_circuitbreaker=info")
    //!     .init();
    //! ```
    //!
    //! Circuit-open and no-healthy-instance responses are expected under
    //! failure and are logged at `debug`, not as errors.
}
