use std::time::{Duration, Instant};
use tower_mesh_core::MeshEvent;

/// Events emitted by the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A request was counted and allowed.
    PermitAcquired {
        limiter: String,
        timestamp: Instant,
        scope: String,
        client: String,
        remaining: u32,
    },
    /// A request was rejected.
    PermitRejected {
        limiter: String,
        timestamp: Instant,
        scope: String,
        client: String,
        retry_after: Duration,
    },
}

impl MeshEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "permit_acquired",
            RateLimiterEvent::PermitRejected { .. } => "permit_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { limiter, .. }
            | RateLimiterEvent::PermitRejected { limiter, .. } => limiter,
        }
    }
}
