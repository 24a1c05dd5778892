//! Instance selection for the mesh.
//!
//! [`LoadBalancer::select`] picks one candidate from a slice that discovery
//! already filtered to healthy instances, using a [`LoadBalanceStrategy`]:
//!
//! - **Round-robin**: a cursor per key advances on every call and wraps
//!   modulo the candidate count.
//! - **Random**: uniform pick.
//! - **Least-connections**: fewest in-flight calls according to the
//!   [`ConnectionTracker`]; ties go to the earliest candidate.
//!
//! Callers bracket each backend call with [`LoadBalancer::track`], whose
//! guard keeps the in-flight count accurate even when the call is cancelled.
//!
//! ```rust
//! use tower_mesh_loadbalancer::{LoadBalanceStrategy, LoadBalancer};
//! use tower_mesh_registry::ServiceInstance;
//!
//! let lb = LoadBalancer::new();
//! let healthy = vec![
//!     ServiceInstance::new("users-1", "user-service", "10.0.0.1", 8080),
//!     ServiceInstance::new("users-2", "user-service", "10.0.0.2", 8080),
//! ];
//!
//! let target = lb
//!     .select("user-service", &healthy, LoadBalanceStrategy::LeastConnections)
//!     .unwrap();
//! let _in_flight = lb.track(target.id());
//! assert_eq!(lb.connections().count("users-1"), 1);
//! ```

mod balancer;
mod connections;
mod strategy;

pub use balancer::{Candidate, LoadBalancer};
pub use connections::{ConnectionGuard, ConnectionTracker};
pub use strategy::{LoadBalanceStrategy, ParseStrategyError};
