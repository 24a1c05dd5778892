use crate::config::RateLimiterConfig;
use crate::error::RateLimiterError;
use crate::events::RateLimiterEvent;
use crate::window::{RateLimit, WindowCounter};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Fixed-window request counters keyed by scope and client.
///
/// The scope separates independent limits (the gateway uses one scope per
/// route) so one client's traffic on one route never consumes another
/// route's budget. Counters live in a sharded map; checks for different
/// clients do not contend.
///
/// # Examples
///
/// ```rust
/// use tower_mesh_ratelimiter::{ClientRateLimiter, RateLimit};
///
/// let limiter = ClientRateLimiter::default();
/// let limit = RateLimit::per_minute(2);
///
/// assert!(limiter.check("GET /api/users/:id", "10.0.0.1", &limit).is_ok());
/// assert!(limiter.check("GET /api/users/:id", "10.0.0.1", &limit).is_ok());
/// let err = limiter.check("GET /api/users/:id", "10.0.0.1", &limit).unwrap_err();
/// assert!(err.retry_after().as_secs() <= 60);
///
/// // Another client has its own window.
/// assert!(limiter.check("GET /api/users/:id", "10.0.0.2", &limit).is_ok());
/// ```
#[derive(Debug)]
pub struct ClientRateLimiter {
    config: RateLimiterConfig,
    counters: DashMap<(String, String), WindowCounter>,
    created: Instant,
    // Earliest time, in nanoseconds since `created`, the next over-capacity
    // sweep may run.
    next_sweep: AtomicU64,
}

impl Default for ClientRateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl ClientRateLimiter {
    /// Creates a limiter with no tracked clients.
    pub fn new(config: RateLimiterConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "ratelimiter_calls_total",
                "Total number of rate limiter checks by result (permitted, rejected)"
            );
        });

        Self {
            config,
            counters: DashMap::new(),
            created: Instant::now(),
            next_sweep: AtomicU64::new(0),
        }
    }

    /// Returns the limiter configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Counts one request from `client` in `scope` against `limit`.
    ///
    /// Returns the requests left in the current window, or
    /// [`RateLimiterError::RateLimitExceeded`] with the time until the window
    /// resets. Rejected requests are not counted.
    pub fn check(
        &self,
        scope: &str,
        client: &str,
        limit: &RateLimit,
    ) -> Result<u32, RateLimiterError> {
        let now = Instant::now();
        let result = self
            .counters
            .entry((scope.to_string(), client.to_string()))
            .or_insert_with(|| WindowCounter::new(now, limit.window))
            .try_acquire(limit, now);

        if self.counters.len() > self.config.max_tracked_clients {
            self.maybe_sweep(now, limit.window);
        }

        match result {
            Ok(remaining) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    ratelimiter = %self.config.name,
                    scope = %scope,
                    client = %client,
                    remaining,
                    "request permitted"
                );

                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "result" => "permitted").increment(1);

                self.config
                    .event_listeners
                    .emit_with(|| RateLimiterEvent::PermitAcquired {
                        limiter: self.config.name.clone(),
                        timestamp: now,
                        scope: scope.to_string(),
                        client: client.to_string(),
                        remaining,
                    });
                Ok(remaining)
            }
            Err(retry_after) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    ratelimiter = %self.config.name,
                    scope = %scope,
                    client = %client,
                    retry_after = ?retry_after,
                    "rate limit exceeded"
                );

                #[cfg(feature = "metrics")]
                counter!("ratelimiter_calls_total", "ratelimiter" => self.config.name.clone(), "result" => "rejected").increment(1);

                self.config
                    .event_listeners
                    .emit_with(|| RateLimiterEvent::PermitRejected {
                        limiter: self.config.name.clone(),
                        timestamp: now,
                        scope: scope.to_string(),
                        client: client.to_string(),
                        retry_after,
                    });
                Err(RateLimiterError::RateLimitExceeded { retry_after })
            }
        }
    }

    /// Sweeps expired counters unless a sweep already ran within the last
    /// `window`. Only one caller wins each due sweep.
    fn maybe_sweep(&self, now: Instant, window: Duration) {
        let elapsed = nanos(now.saturating_duration_since(self.created));
        let due = self.next_sweep.load(Ordering::Acquire);
        if elapsed < due {
            return;
        }
        let next = elapsed.saturating_add(nanos(window).max(1));
        if self
            .next_sweep
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let removed = self.evict_expired();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            ratelimiter = %self.config.name,
            removed,
            tracked = self.counters.len(),
            "swept expired rate limit windows"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = removed;
    }

    /// Removes counters whose window has ended. Returns how many were
    /// removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired(now));
        before.saturating_sub(self.counters.len())
    }

    /// Forgets every counter for `client` in `scope`.
    pub fn reset(&self, scope: &str, client: &str) {
        self.counters
            .remove(&(scope.to_string(), client.to_string()));
    }

    /// Number of tracked counters.
    pub fn tracked_clients(&self) -> usize {
        self.counters.len()
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
