//! Stress tests for tower-mesh components
//!
//! Marked `#[ignore]`; see `tests/stress.rs` for how to run them.
//!
//! ## What We Test
//!
//! - **High volume**: Hundreds of thousands of dispatches and selections
//! - **High concurrency**: Thousands of concurrent requests through the gateway
//! - **State consistency**: Connection counts and breaker state after load
//! - **Registry churn**: Registration and discovery racing each other

pub mod circuitbreaker;
pub mod gateway;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower_mesh_registry::{ServiceInstance, ServiceRegistry};

/// Counts backend calls in flight and remembers the peak.
///
/// Slots are RAII guards, so a call that panics or is cancelled mid-flight
/// still gives its slot back.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(self: &Arc<Self>) -> InFlightSlot {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        InFlightSlot(Arc::clone(self))
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

pub struct InFlightSlot(Arc<InFlight>);

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Registry with `instances` heartbeating instances of `service`, ids
/// `<service>-0..n`, one port each.
pub fn healthy_registry(service: &str, instances: usize) -> ServiceRegistry {
    let registry = ServiceRegistry::default();
    for i in 0..instances {
        let id = format!("{service}-{i}");
        let port = 9000 + (i % 50_000) as u16;
        registry.register(ServiceInstance::new(&id, service, "10.0.0.1", port));
        registry.heartbeat(&id).unwrap();
    }
    registry
}
