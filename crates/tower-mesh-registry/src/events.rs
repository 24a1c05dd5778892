//! Registry events.

use crate::HealthStatus;
use std::time::Instant;
use tower_mesh_core::MeshEvent;

/// Events emitted by a [`ServiceRegistry`](crate::ServiceRegistry).
///
/// Listeners run synchronously on the thread that changed the registry, after
/// the change is visible to readers.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// An instance was registered. `replaced` is `true` when an instance with
    /// the same id already existed.
    InstanceRegistered {
        registry: String,
        timestamp: Instant,
        instance_id: String,
        service: String,
        replaced: bool,
    },
    /// An instance was removed.
    InstanceUnregistered {
        registry: String,
        timestamp: Instant,
        instance_id: String,
        service: String,
    },
    /// An instance reported liveness.
    HeartbeatReceived {
        registry: String,
        timestamp: Instant,
        instance_id: String,
    },
    /// An instance's heartbeat aged past the configured TTL.
    HeartbeatExpired {
        registry: String,
        timestamp: Instant,
        instance_id: String,
    },
    /// An instance's health status changed.
    HealthChanged {
        registry: String,
        timestamp: Instant,
        instance_id: String,
        from: HealthStatus,
        to: HealthStatus,
    },
}

impl MeshEvent for RegistryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RegistryEvent::InstanceRegistered { .. } => "instance_registered",
            RegistryEvent::InstanceUnregistered { .. } => "instance_unregistered",
            RegistryEvent::HeartbeatReceived { .. } => "heartbeat_received",
            RegistryEvent::HeartbeatExpired { .. } => "heartbeat_expired",
            RegistryEvent::HealthChanged { .. } => "health_changed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RegistryEvent::InstanceRegistered { timestamp, .. }
            | RegistryEvent::InstanceUnregistered { timestamp, .. }
            | RegistryEvent::HeartbeatReceived { timestamp, .. }
            | RegistryEvent::HeartbeatExpired { timestamp, .. }
            | RegistryEvent::HealthChanged { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RegistryEvent::InstanceRegistered { registry, .. }
            | RegistryEvent::InstanceUnregistered { registry, .. }
            | RegistryEvent::HeartbeatReceived { registry, .. }
            | RegistryEvent::HeartbeatExpired { registry, .. }
            | RegistryEvent::HealthChanged { registry, .. } => registry,
        }
    }

    fn instance_id(&self) -> Option<&str> {
        match self {
            RegistryEvent::InstanceRegistered { instance_id, .. }
            | RegistryEvent::InstanceUnregistered { instance_id, .. }
            | RegistryEvent::HeartbeatReceived { instance_id, .. }
            | RegistryEvent::HeartbeatExpired { instance_id, .. }
            | RegistryEvent::HealthChanged { instance_id, .. } => Some(instance_id),
        }
    }
}
