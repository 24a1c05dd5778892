//! Service instance descriptors.

use crate::HealthStatus;
use std::collections::HashMap;
use std::fmt;
use std::time::{Instant, SystemTime};

/// Network location of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceAddress {
    /// Hostname or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl InstanceAddress {
    /// Creates an address from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One running copy of a logical service.
///
/// Callers build the descriptor part (id, service, version, address, health
/// path, metadata) and hand it to
/// [`ServiceRegistry::register`](crate::ServiceRegistry::register). The
/// registry owns the remaining fields (registration time, heartbeat, status);
/// snapshots returned from discovery carry their values at the time of the
/// call.
///
/// ```rust
/// use tower_mesh_registry::{HealthStatus, ServiceInstance};
///
/// let instance = ServiceInstance::new("users-1", "user-service", "10.0.0.7", 8080)
///     .with_version("2.3.1")
///     .with_health_check_path("/healthz")
///     .with_metadata("zone", "eu-west-1a");
///
/// assert_eq!(instance.address().to_string(), "10.0.0.7:8080");
/// assert_eq!(instance.health_check_url(), "http://10.0.0.7:8080/healthz");
/// assert_eq!(instance.status(), HealthStatus::Unknown);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    id: String,
    service: String,
    version: String,
    address: InstanceAddress,
    health_check_path: String,
    metadata: HashMap<String, String>,
    pub(crate) registered_at: SystemTime,
    pub(crate) last_heartbeat: Instant,
    pub(crate) status: HealthStatus,
}

impl ServiceInstance {
    /// Creates an instance descriptor with an empty version, `/health` as the
    /// health path and no metadata.
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            version: String::new(),
            address: InstanceAddress::new(host, port),
            health_check_path: "/health".to_string(),
            metadata: HashMap::new(),
            registered_at: SystemTime::now(),
            last_heartbeat: Instant::now(),
            status: HealthStatus::Unknown,
        }
    }

    /// Sets the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the path probed by the health loop.
    pub fn with_health_check_path(mut self, path: impl Into<String>) -> Self {
        self.health_check_path = path.into();
        self
    }

    /// Adds one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Opaque instance id, unique within a registry.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Version string; empty if never set.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Network address.
    pub fn address(&self) -> &InstanceAddress {
        &self.address
    }

    /// Health-check path.
    pub fn health_check_path(&self) -> &str {
        &self.health_check_path
    }

    /// `http://host:port/path` for the health endpoint.
    pub fn health_check_url(&self) -> String {
        format!("http://{}{}", self.address, self.health_check_path)
    }

    /// Arbitrary metadata.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// When the registry accepted this registration.
    pub fn registered_at(&self) -> SystemTime {
        self.registered_at
    }

    /// Last heartbeat or successful probe.
    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
    }

    /// Health status at snapshot time.
    pub fn status(&self) -> HealthStatus {
        self.status
    }
}
