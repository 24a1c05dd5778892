//! Per-client request ceilings.
//!
//! A [`ClientRateLimiter`] counts requests per (scope, client) in fixed
//! windows. Counters are advisory: evicting one only reopens that client's
//! window early.
//!
//! ## Features
//!
//! - `tracing`: log rejections at `debug` and permits at `trace`
//! - `metrics`: `ratelimiter_calls_total{ratelimiter, result}`
//! - `serde`: derive `Serialize`/`Deserialize` for [`RateLimit`]

mod config;
mod error;
mod events;
mod limiter;
mod window;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;
pub use limiter::ClientRateLimiter;
pub use window::RateLimit;
