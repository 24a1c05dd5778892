use std::time::Duration;
use thiserror::Error;
use tower_mesh_core::MeshError;

/// Errors returned by the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimiterError {
    /// The client reached the ceiling for the current window.
    #[error("rate limit exceeded; retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Time until the client's window resets.
        retry_after: Duration,
    },
}

impl RateLimiterError {
    /// Time until the window resets.
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimiterError::RateLimitExceeded { retry_after } => *retry_after,
        }
    }

    /// Converts into the gateway taxonomy for `client`.
    pub fn into_mesh_error(self, client: impl Into<String>) -> MeshError {
        MeshError::RateLimitExceeded {
            client: client.into(),
            retry_after: Some(self.retry_after()),
        }
    }
}
