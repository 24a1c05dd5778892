//! Circuit breaker integration tests.
//!
//! Test organization:
//! - thresholds.rs: consecutive-failure counting and rejection while open
//! - half_open.rs: the single trial call and its outcomes
//! - layer.rs: the breaker as tower middleware, events and manual control

mod layer;
