//! In-memory service registry with proactive health probing.
//!
//! The registry holds every known [`ServiceInstance`], tracks its health and
//! answers discovery queries with the instances currently eligible for
//! traffic. Health comes from two sources:
//!
//! - **Heartbeats** pushed by the instances themselves
//!   ([`ServiceRegistry::heartbeat`]);
//! - **Probes** pulled by a background loop
//!   ([`ServiceRegistry::start_health_checks`]) through a [`HealthChecker`].
//!
//! Probe failures never surface as errors: a failed, timed-out or panicking
//! probe only flips the instance to [`HealthStatus::Unhealthy`].
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use tower_mesh_registry::{HealthStatus, RegistryConfig, ServiceInstance, ServiceRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = ServiceRegistry::new(
//!     RegistryConfig::builder()
//!         .name("mesh")
//!         .health_check_interval(Duration::from_secs(5))
//!         .probe_timeout(Duration::from_secs(1))
//!         .on_health_change(|id, from, to| println!("{id}: {from} -> {to}"))
//!         .build(),
//! );
//!
//! registry.register(
//!     ServiceInstance::new("users-1", "user-service", "10.0.0.7", 8080).with_version("2.3.1"),
//! );
//!
//! registry.start_health_checks(|instance: &ServiceInstance| {
//!     let url = instance.health_check_url();
//!     async move {
//!         // issue GET {url} with your HTTP client here
//!         let _ = url;
//!         HealthStatus::Healthy
//!     }
//! });
//!
//! let healthy = registry.discover("user-service", Some("2.3.1"));
//! # let _ = healthy;
//! # }
//! ```

mod checker;
mod config;
mod error;
pub mod events;
mod instance;
mod registry;

pub use checker::HealthChecker;
pub use config::{RegistryConfig, RegistryConfigBuilder};
pub use error::RegistryError;
pub use events::RegistryEvent;
pub use instance::{InstanceAddress, ServiceInstance};
pub use registry::{HealthDetail, ServiceRegistry};

use std::fmt;

/// Health status of a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HealthStatus {
    /// Eligible for traffic.
    Healthy,

    /// Last probe failed, timed out, or the heartbeat expired.
    Unhealthy,

    /// Not yet probed or heartbeated since registration.
    Unknown,
}

impl HealthStatus {
    /// Returns `true` for [`HealthStatus::Healthy`].
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Lowercase name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HealthStatus> for u8 {
    fn from(status: HealthStatus) -> u8 {
        match status {
            HealthStatus::Healthy => 0,
            HealthStatus::Unhealthy => 1,
            HealthStatus::Unknown => 2,
        }
    }
}

impl From<u8> for HealthStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => HealthStatus::Healthy,
            1 => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}
