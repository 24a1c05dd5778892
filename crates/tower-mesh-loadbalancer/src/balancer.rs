//! The load balancer.

use crate::connections::{ConnectionGuard, ConnectionTracker};
use crate::LoadBalanceStrategy;
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower_mesh_registry::ServiceInstance;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Something with a stable id that can be selected.
pub trait Candidate {
    /// Id used for connection accounting and candidate-set keys.
    fn candidate_id(&self) -> &str;
}

impl Candidate for ServiceInstance {
    fn candidate_id(&self) -> &str {
        self.id()
    }
}

impl Candidate for String {
    fn candidate_id(&self) -> &str {
        self
    }
}

impl Candidate for &str {
    fn candidate_id(&self) -> &str {
        self
    }
}

impl<T: Candidate + ?Sized> Candidate for std::sync::Arc<T> {
    fn candidate_id(&self) -> &str {
        (**self).candidate_id()
    }
}

/// Picks one candidate per call.
///
/// Round-robin cursors are kept per key. Passing the logical service name as
/// the key keeps the rotation going while instances come and go; use
/// [`LoadBalancer::candidate_set_key`] to key by the exact candidate set
/// instead.
///
/// # Examples
///
/// ```rust
/// use tower_mesh_loadbalancer::{LoadBalanceStrategy, LoadBalancer};
///
/// let lb = LoadBalancer::new();
/// let backends = ["a", "b", "c"];
///
/// let picks: Vec<&str> = (0..4)
///     .map(|_| *lb.select("api", &backends, LoadBalanceStrategy::RoundRobin).unwrap())
///     .collect();
/// assert_eq!(picks, ["a", "b", "c", "a"]);
///
/// lb.connections().set("a", 3);
/// lb.connections().set("b", 1);
/// lb.connections().set("c", 2);
/// assert_eq!(
///     lb.select("api", &backends, LoadBalanceStrategy::LeastConnections),
///     Some(&"b")
/// );
/// ```
#[derive(Debug, Default)]
pub struct LoadBalancer {
    cursors: DashMap<String, AtomicUsize>,
    connections: ConnectionTracker,
}

impl LoadBalancer {
    /// Creates a balancer with no cursors and an empty connection tracker.
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "loadbalancer_selections_total",
                "Total number of instance selections by strategy"
            );
        });

        Self::default()
    }

    /// Creates a balancer that shares an existing connection tracker.
    pub fn with_connections(connections: ConnectionTracker) -> Self {
        Self {
            connections,
            ..Self::new()
        }
    }

    /// The connection tracker consulted by least-connections.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    /// Marks a call to `id` as in flight until the guard drops.
    pub fn track(&self, id: &str) -> ConnectionGuard {
        self.connections.acquire(id)
    }

    /// Picks one of `candidates`.
    ///
    /// Returns `None` for an empty slice. A single candidate is returned
    /// without consulting the strategy (round-robin cursors do not advance).
    pub fn select<'a, T: Candidate>(
        &self,
        key: &str,
        candidates: &'a [T],
        strategy: LoadBalanceStrategy,
    ) -> Option<&'a T> {
        let selected = match candidates {
            [] => return None,
            [only] => only,
            _ => match strategy {
                LoadBalanceStrategy::RoundRobin => {
                    let n = self.advance(key);
                    &candidates[n % candidates.len()]
                }
                LoadBalanceStrategy::Random => {
                    &candidates[rand::rng().random_range(0..candidates.len())]
                }
                LoadBalanceStrategy::LeastConnections => candidates
                    .iter()
                    .min_by_key(|c| self.connections.count(c.candidate_id()))?,
            },
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(
            key = %key,
            strategy = %strategy,
            candidates = candidates.len(),
            selected = %selected.candidate_id(),
            "instance selected"
        );

        #[cfg(feature = "metrics")]
        counter!("loadbalancer_selections_total", "strategy" => strategy.name()).increment(1);

        Some(selected)
    }

    /// Returns a key identifying the exact candidate set: the sorted ids
    /// joined with commas.
    pub fn candidate_set_key<T: Candidate>(candidates: &[T]) -> String {
        let mut ids: Vec<&str> = candidates.iter().map(Candidate::candidate_id).collect();
        ids.sort_unstable();
        ids.join(",")
    }

    /// Drops the round-robin cursor for `key`.
    pub fn reset_cursor(&self, key: &str) {
        self.cursors.remove(key);
    }

    fn advance(&self, key: &str) -> usize {
        if let Some(cursor) = self.cursors.get(key) {
            return cursor.fetch_add(1, Ordering::Relaxed);
        }
        self.cursors
            .entry(key.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed)
    }
}
