use std::time::{Duration, Instant};

/// A request ceiling per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateLimit {
    /// Requests allowed in one window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    /// `max_requests` per `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `max_requests` per second.
    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    /// `max_requests` per minute.
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Request count of one client in the current window.
#[derive(Debug, Clone)]
pub(crate) struct WindowCounter {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl WindowCounter {
    pub(crate) fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            window,
        }
    }

    /// Counts one request against `limit`.
    ///
    /// Returns the requests left in the window on success, or the time until
    /// the window resets when the ceiling is reached.
    pub(crate) fn try_acquire(&mut self, limit: &RateLimit, now: Instant) -> Result<u32, Duration> {
        self.window = limit.window;
        if now.duration_since(self.window_start) >= self.window {
            self.count = 0;
            self.window_start = now;
        }

        if self.count < limit.max_requests {
            self.count += 1;
            Ok(limit.max_requests - self.count)
        } else {
            let elapsed = now.duration_since(self.window_start);
            Err(self.window.saturating_sub(elapsed))
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.window_start) >= self.window
    }
}
