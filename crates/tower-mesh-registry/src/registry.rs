//! The registry and its background health loop.

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::events::RegistryEvent;
use crate::{HealthChecker, HealthStatus, ServiceInstance};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Instant, SystemTime};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::error::Elapsed;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_gauge!(
            "registry_instances",
            "Number of registered instances per service"
        );
        describe_counter!(
            "registry_probes_total",
            "Total number of health probes by outcome (healthy, unhealthy, unknown, timeout)"
        );
    });
}

/// Health bookkeeping snapshot for one instance.
#[derive(Debug, Clone)]
pub struct HealthDetail {
    /// Instance id.
    pub instance_id: String,
    /// Logical service name.
    pub service: String,
    /// Current status.
    pub status: HealthStatus,
    /// Last heartbeat or successful probe.
    pub last_heartbeat: Instant,
    /// When the last probe result was recorded, if any.
    pub last_check: Option<Instant>,
    /// Consecutive successful probes.
    pub consecutive_successes: u32,
    /// Consecutive failed probes.
    pub consecutive_failures: u32,
}

struct Entry {
    instance: ServiceInstance,
    // Bumped on every (re-)registration so late probe results for a replaced
    // registration are discarded.
    generation: u64,
    // Set while a probe for this registration is outstanding; the loop skips
    // instances that have not answered yet.
    probing: bool,
    consecutive_successes: u32,
    consecutive_failures: u32,
    last_check: Option<Instant>,
}

pub(crate) struct RegistryInner {
    config: RegistryConfig,
    entries: DashMap<String, Entry>,
    next_generation: AtomicU64,
}

/// In-memory registry of service instances.
///
/// The instance map is sharded, so registrations, heartbeats, probe results
/// and discovery queries for unrelated instances never contend on a single
/// lock. The registry is meant to be constructed once and shared via
/// `Arc<ServiceRegistry>`.
///
/// # Examples
///
/// ```rust
/// use tower_mesh_registry::{ServiceInstance, ServiceRegistry};
///
/// let registry = ServiceRegistry::default();
/// registry.register(ServiceInstance::new("users-1", "user-service", "10.0.0.7", 8080));
///
/// // Newly registered instances are `Unknown` until a heartbeat or probe.
/// assert!(registry.discover("user-service", None).is_empty());
///
/// registry.heartbeat("users-1").unwrap();
/// let found = registry.discover("user-service", None);
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].id(), "users-1");
/// ```
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("name", &self.inner.config.name)
            .field("instances", &self.inner.entries.len())
            .field("health_checks_running", &self.is_health_checking())
            .finish()
    }
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();

        Self {
            inner: Arc::new(RegistryInner {
                config,
                entries: DashMap::new(),
                next_generation: AtomicU64::new(0),
            }),
            health_task: Mutex::new(None),
        }
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Inserts or replaces the instance with this id.
    ///
    /// The stored status starts as [`HealthStatus::Unknown`] and the
    /// heartbeat clock starts now, whatever the passed descriptor carried.
    /// Re-registering an existing id is not an error.
    pub fn register(&self, mut instance: ServiceInstance) {
        let inner = &self.inner;
        instance.status = HealthStatus::Unknown;
        instance.registered_at = SystemTime::now();
        instance.last_heartbeat = Instant::now();

        let id = instance.id().to_string();
        let service = instance.service().to_string();
        let entry = Entry {
            instance,
            generation: inner.next_generation.fetch_add(1, Ordering::Relaxed),
            probing: false,
            consecutive_successes: 0,
            consecutive_failures: 0,
            last_check: None,
        };
        let previous = inner.entries.insert(id.clone(), entry);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            registry = %inner.config.name,
            instance = %id,
            service = %service,
            replaced = previous.is_some(),
            "instance registered"
        );

        #[cfg(feature = "metrics")]
        {
            if let Some(old) = &previous {
                if old.instance.service() != service {
                    inner.record_service_gauge(old.instance.service());
                }
            }
            inner.record_service_gauge(&service);
        }

        inner
            .config
            .event_listeners
            .emit_with(|| RegistryEvent::InstanceRegistered {
                registry: inner.config.name.clone(),
                timestamp: Instant::now(),
                instance_id: id,
                service,
                replaced: previous.is_some(),
            });
    }

    /// Removes the instance with this id and returns its last snapshot.
    /// Unknown ids are ignored.
    pub fn unregister(&self, id: &str) -> Option<ServiceInstance> {
        let inner = &self.inner;
        let (_, entry) = inner.entries.remove(id)?;
        let service = entry.instance.service().to_string();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            registry = %inner.config.name,
            instance = %id,
            service = %service,
            "instance unregistered"
        );

        #[cfg(feature = "metrics")]
        inner.record_service_gauge(&service);

        inner
            .config
            .event_listeners
            .emit_with(|| RegistryEvent::InstanceUnregistered {
                registry: inner.config.name.clone(),
                timestamp: Instant::now(),
                instance_id: id.to_string(),
                service,
            });

        Some(entry.instance)
    }

    /// Records a liveness report: refreshes the heartbeat and marks the
    /// instance healthy.
    ///
    /// Returns [`RegistryError::UnknownInstance`] for ids that are not
    /// registered; the caller should register again.
    pub fn heartbeat(&self, id: &str) -> Result<(), RegistryError> {
        let inner = &self.inner;
        let from = {
            let mut entry =
                inner
                    .entries
                    .get_mut(id)
                    .ok_or_else(|| RegistryError::UnknownInstance {
                        id: id.to_string(),
                    })?;
            let from = entry.instance.status;
            entry.instance.last_heartbeat = Instant::now();
            entry.instance.status = HealthStatus::Healthy;
            entry.consecutive_failures = 0;
            from
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(registry = %inner.config.name, instance = %id, "heartbeat");

        inner
            .config
            .event_listeners
            .emit_with(|| RegistryEvent::HeartbeatReceived {
                registry: inner.config.name.clone(),
                timestamp: Instant::now(),
                instance_id: id.to_string(),
            });

        if from != HealthStatus::Healthy {
            inner.health_changed(id, from, HealthStatus::Healthy);
        }
        Ok(())
    }

    /// Returns healthy instances of `service`, optionally restricted to one
    /// version, sorted by id.
    ///
    /// When heartbeat expiry is enabled, instances whose last heartbeat is
    /// older than the TTL are left out even if the health loop has not yet
    /// marked them unhealthy. An empty result is not an error.
    pub fn discover(&self, service: &str, version: Option<&str>) -> Vec<ServiceInstance> {
        let ttl = self.inner.config.heartbeat_ttl;
        let mut found: Vec<ServiceInstance> = self
            .inner
            .entries
            .iter()
            .filter(|entry| {
                let instance = &entry.instance;
                instance.service() == service
                    && version.map_or(true, |v| instance.version() == v)
                    && instance.status == HealthStatus::Healthy
                    && ttl.map_or(true, |ttl| instance.last_heartbeat.elapsed() <= ttl)
            })
            .map(|entry| entry.instance.clone())
            .collect();
        found.sort_by(|a, b| a.id().cmp(b.id()));
        found
    }

    /// Returns a snapshot of one instance, whatever its status.
    pub fn get(&self, id: &str) -> Option<ServiceInstance> {
        self.inner
            .entries
            .get(id)
            .map(|entry| entry.instance.clone())
    }

    /// Returns the status of one instance.
    pub fn status(&self, id: &str) -> Option<HealthStatus> {
        self.inner.entries.get(id).map(|entry| entry.instance.status)
    }

    /// Returns snapshots of every registered instance, sorted by id.
    pub fn instances(&self) -> Vec<ServiceInstance> {
        let mut all: Vec<ServiceInstance> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.instance.clone())
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Returns the distinct service names with at least one registration.
    pub fn services(&self) -> Vec<String> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.instance.service().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns health bookkeeping for every instance, sorted by id.
    pub fn health_details(&self) -> Vec<HealthDetail> {
        let mut details: Vec<HealthDetail> = self
            .inner
            .entries
            .iter()
            .map(|entry| HealthDetail {
                instance_id: entry.instance.id().to_string(),
                service: entry.instance.service().to_string(),
                status: entry.instance.status,
                last_heartbeat: entry.instance.last_heartbeat,
                last_check: entry.last_check,
                consecutive_successes: entry.consecutive_successes,
                consecutive_failures: entry.consecutive_failures,
            })
            .collect();
        details.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        details
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Probes every registered instance, waits for all results to be
    /// applied, then expires stale heartbeats.
    ///
    /// Instances with a probe already outstanding (from the health loop) are
    /// not probed twice. Must be called within a Tokio runtime.
    pub async fn probe_all<C>(&self, checker: Arc<C>)
    where
        C: HealthChecker + 'static,
    {
        for handle in self.inner.spawn_probes(&checker) {
            let _ = handle.await;
        }
        self.inner.expire_heartbeats();
    }

    /// Marks instances whose heartbeat is older than the TTL as unhealthy.
    /// Returns the ids that expired.
    pub fn expire_heartbeats(&self) -> Vec<String> {
        self.inner.expire_heartbeats()
    }

    /// Starts the background health loop, replacing any running loop.
    ///
    /// Every `health_check_interval` (after `initial_delay`) each registered
    /// instance is probed in its own task, bounded by `probe_timeout`. Each
    /// task applies its own result, so ticks never wait on slow instances and
    /// a hanging instance only delays its own next probe. The loop stops when
    /// [`stop_health_checks`](Self::stop_health_checks) is called or the
    /// registry is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_health_checks<C>(&self, checker: C)
    where
        C: HealthChecker + 'static,
    {
        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let checker = Arc::new(checker);
        let interval = self.inner.config.health_check_interval;
        let initial_delay = self.inner.config.initial_delay;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            registry = %self.inner.config.name,
            interval = ?interval,
            "starting health checks"
        );

        let task = tokio::spawn(async move {
            if !initial_delay.is_zero() {
                tokio::time::sleep(initial_delay).await;
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                drop(inner.spawn_probes(&checker));
                inner.expire_heartbeats();
            }
        });

        let previous = self
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stops the background health loop, if running.
    pub fn stop_health_checks(&self) {
        let task = self
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();

            #[cfg(feature = "tracing")]
            tracing::debug!(registry = %self.inner.config.name, "stopped health checks");
        }
    }

    /// Returns `true` while a health loop is running.
    pub fn is_health_checking(&self) -> bool {
        self.health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        if let Some(task) = self
            .health_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

impl RegistryInner {
    /// Spawns one probe task per instance that is not already being probed.
    /// Each task applies its result when it finishes.
    fn spawn_probes<C>(self: &Arc<Self>, checker: &Arc<C>) -> Vec<JoinHandle<()>>
    where
        C: HealthChecker + 'static,
    {
        let mut targets = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if !entry.probing {
                entry.probing = true;
                targets.push((entry.instance.clone(), entry.generation));
            }
        }

        let timeout = self.config.probe_timeout;
        targets
            .into_iter()
            .map(|(instance, generation)| {
                let registry = Arc::downgrade(self);
                let checker = Arc::clone(checker);
                tokio::spawn(async move {
                    let id = instance.id().to_string();
                    let mut probe = tokio::spawn(async move { checker.check(&instance).await });
                    let outcome = tokio::time::timeout(timeout, &mut probe).await;
                    if outcome.is_err() {
                        probe.abort();
                    }

                    let Some(inner) = registry.upgrade() else {
                        return;
                    };
                    let status = inner.probe_outcome(&id, outcome);
                    inner.record_probe(&id, generation, status);
                })
            })
            .collect()
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn probe_outcome(
        &self,
        id: &str,
        outcome: Result<Result<HealthStatus, JoinError>, Elapsed>,
    ) -> HealthStatus {
        match outcome {
            Ok(Ok(status)) => {
                #[cfg(feature = "metrics")]
                counter!("registry_probes_total", "outcome" => status.as_str()).increment(1);
                status
            }
            Ok(Err(_join_error)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    registry = %self.config.name,
                    instance = %id,
                    "health probe panicked"
                );
                #[cfg(feature = "metrics")]
                counter!("registry_probes_total", "outcome" => "unhealthy").increment(1);
                HealthStatus::Unhealthy
            }
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    registry = %self.config.name,
                    instance = %id,
                    timeout = ?self.config.probe_timeout,
                    "health probe timed out"
                );
                #[cfg(feature = "metrics")]
                counter!("registry_probes_total", "outcome" => "timeout").increment(1);
                HealthStatus::Unhealthy
            }
        }
    }

    fn record_probe(&self, id: &str, generation: u64, result: HealthStatus) {
        let transition = {
            let Some(mut entry) = self.entries.get_mut(id) else {
                return;
            };
            if entry.generation != generation {
                return;
            }
            entry.probing = false;

            let now = Instant::now();
            entry.last_check = Some(now);
            let from = entry.instance.status;

            match result {
                HealthStatus::Healthy => {
                    entry.consecutive_failures = 0;
                    entry.consecutive_successes = entry.consecutive_successes.saturating_add(1);
                    entry.instance.last_heartbeat = now;
                    if entry.consecutive_successes >= self.config.success_threshold {
                        entry.instance.status = HealthStatus::Healthy;
                    }
                }
                HealthStatus::Unhealthy => {
                    entry.consecutive_successes = 0;
                    entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
                    if entry.consecutive_failures >= self.config.failure_threshold {
                        entry.instance.status = HealthStatus::Unhealthy;
                    }
                }
                HealthStatus::Unknown => {}
            }

            (from, entry.instance.status)
        };

        if transition.0 != transition.1 {
            self.health_changed(id, transition.0, transition.1);
        }
    }

    fn expire_heartbeats(&self) -> Vec<String> {
        let Some(ttl) = self.config.heartbeat_ttl else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        for mut entry in self.entries.iter_mut() {
            if entry.instance.status != HealthStatus::Unhealthy
                && entry.instance.last_heartbeat.elapsed() > ttl
            {
                let from = entry.instance.status;
                entry.instance.status = HealthStatus::Unhealthy;
                expired.push((entry.key().clone(), from));
            }
        }

        for (id, from) in &expired {
            #[cfg(feature = "tracing")]
            tracing::debug!(registry = %self.config.name, instance = %id, ttl = ?ttl, "heartbeat expired");

            self.config
                .event_listeners
                .emit_with(|| RegistryEvent::HeartbeatExpired {
                    registry: self.config.name.clone(),
                    timestamp: Instant::now(),
                    instance_id: id.clone(),
                });
            self.health_changed(id, *from, HealthStatus::Unhealthy);
        }

        expired.into_iter().map(|(id, _)| id).collect()
    }

    fn health_changed(&self, id: &str, from: HealthStatus, to: HealthStatus) {
        #[cfg(feature = "tracing")]
        match to {
            HealthStatus::Unhealthy => tracing::warn!(
                registry = %self.config.name,
                instance = %id,
                from = %from,
                "instance became unhealthy"
            ),
            _ => tracing::info!(
                registry = %self.config.name,
                instance = %id,
                from = %from,
                to = %to,
                "instance health changed"
            ),
        }

        self.config
            .event_listeners
            .emit_with(|| RegistryEvent::HealthChanged {
                registry: self.config.name.clone(),
                timestamp: Instant::now(),
                instance_id: id.to_string(),
                from,
                to,
            });
    }

    #[cfg(feature = "metrics")]
    fn record_service_gauge(&self, service: &str) {
        let count = self
            .entries
            .iter()
            .filter(|entry| entry.instance.service() == service)
            .count();
        gauge!("registry_instances", "service" => service.to_string()).set(count as f64);
    }
}
