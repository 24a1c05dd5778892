//! Health checker trait.

use crate::{HealthStatus, ServiceInstance};
use std::future::Future;

/// Checks whether one instance should receive traffic.
///
/// The registry calls this for every registered instance on each tick of its
/// health loop and bounds each call with the configured probe timeout; a
/// checker does not need its own deadline. Returning
/// [`HealthStatus::Unknown`] leaves the instance's status untouched.
///
/// # Examples
///
/// Closures implement the trait through a blanket impl:
///
/// ```rust
/// use tower_mesh_registry::{HealthChecker, HealthStatus, ServiceInstance};
///
/// let checker = |instance: &ServiceInstance| {
///     let up = instance.address().port != 0;
///     async move {
///         if up { HealthStatus::Healthy } else { HealthStatus::Unhealthy }
///     }
/// };
/// # fn assert_checker<C: HealthChecker>(_: &C) {}
/// # assert_checker(&checker);
/// ```
///
/// An HTTP checker would typically issue `GET` against
/// [`ServiceInstance::health_check_url`] and map 2xx to `Healthy`:
///
/// ```rust,ignore
/// struct HttpChecker(reqwest::Client);
///
/// impl HealthChecker for HttpChecker {
///     async fn check(&self, instance: &ServiceInstance) -> HealthStatus {
///         match self.0.get(instance.health_check_url()).send().await {
///             Ok(resp) if resp.status().is_success() => HealthStatus::Healthy,
///             _ => HealthStatus::Unhealthy,
///         }
///     }
/// }
/// ```
pub trait HealthChecker: Send + Sync {
    /// Probes `instance` once.
    fn check(&self, instance: &ServiceInstance) -> impl Future<Output = HealthStatus> + Send;
}

impl<F, Fut> HealthChecker for F
where
    F: Fn(&ServiceInstance) -> Fut + Send + Sync,
    Fut: Future<Output = HealthStatus> + Send,
{
    fn check(&self, instance: &ServiceInstance) -> impl Future<Output = HealthStatus> + Send {
        self(instance)
    }
}
