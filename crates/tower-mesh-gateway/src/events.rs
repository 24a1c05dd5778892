use http::StatusCode;
use std::time::{Duration, Instant};
use tower_mesh_core::MeshEvent;

/// Events emitted by the gateway.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A backend answered the request.
    RequestServed {
        gateway: String,
        timestamp: Instant,
        route: String,
        instance: String,
        status: StatusCode,
        duration: Duration,
    },
    /// The request was answered by the gateway itself with an error.
    RequestFailed {
        gateway: String,
        timestamp: Instant,
        route: Option<String>,
        status: StatusCode,
        /// [`MeshError::kind`](tower_mesh_core::MeshError::kind) of the failure.
        kind: &'static str,
        duration: Duration,
    },
}

impl GatewayEvent {
    /// Status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayEvent::RequestServed { status, .. }
            | GatewayEvent::RequestFailed { status, .. } => *status,
        }
    }
}

impl MeshEvent for GatewayEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GatewayEvent::RequestServed { .. } => "request_served",
            GatewayEvent::RequestFailed { .. } => "request_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            GatewayEvent::RequestServed { timestamp, .. }
            | GatewayEvent::RequestFailed { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            GatewayEvent::RequestServed { gateway, .. }
            | GatewayEvent::RequestFailed { gateway, .. } => gateway,
        }
    }

    fn instance_id(&self) -> Option<&str> {
        match self {
            GatewayEvent::RequestServed { instance, .. } => Some(instance),
            GatewayEvent::RequestFailed { .. } => None,
        }
    }
}
